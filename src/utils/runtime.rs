use anyhow::Result;

/// The engine is a single actor task, so one thread is enough for the whole process.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
