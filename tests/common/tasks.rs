use molecule_dispatch::{ChunkOutput, FnTask, Frame, Invocation, MoleculeTask, Series};

/// Maps every atom index `i` of its molecule to `i * 2`
pub fn doubling_task() -> impl MoleculeTask<u64, Output = ChunkOutput<usize, u64>> {
    FnTask::new("double", ["molecule"], |inv: &Invocation<'_, u64>| {
        let series: Series<usize, u64> = inv
            .molecule()
            .indexed()
            .map(|(index, atom)| (index, atom * 2))
            .collect();
        Ok(ChunkOutput::Series(series))
    })
}

/// One row per atom with its square and its scaled value
pub fn squares_frame_task() -> impl MoleculeTask<u64, Output = ChunkOutput<usize, f64>> {
    FnTask::new("squares", ["molecule", "scale"], |inv: &Invocation<'_, u64>| {
        let scale: f64 = inv.arg("scale")?;
        let mut frame = Frame::with_columns(["square", "scaled"]);
        for (index, &atom) in inv.molecule().indexed() {
            let x = atom as f64;
            frame.push_row(index, vec![x * x, x * scale])?;
        }
        Ok(ChunkOutput::Frame(frame))
    })
}

/// Reports its molecule bounds as an opaque JSON value
pub fn bounds_task() -> impl MoleculeTask<u64, Output = ChunkOutput<usize, u64>> {
    FnTask::new("bounds", ["molecule"], |inv: &Invocation<'_, u64>| {
        let range = inv.molecule().range();
        Ok(ChunkOutput::Opaque(serde_json::json!({
            "start": range.start,
            "end": range.end,
        })))
    })
}

/// Fails on the molecule that contains `poisoned_atom`
pub fn poisoned_task(poisoned_atom: u64) -> impl MoleculeTask<u64, Output = ChunkOutput<usize, u64>> {
    FnTask::new("poisoned", ["molecule"], move |inv: &Invocation<'_, u64>| {
        if inv.molecule().atoms().contains(&poisoned_atom) {
            anyhow::bail!("atom {poisoned_atom} is poisoned");
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
        Ok(ChunkOutput::Series(Series::new()))
    })
}
