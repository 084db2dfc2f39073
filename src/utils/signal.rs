use tokio::signal;

/// Resolves on Ctrl+C. If the handler cannot be installed the server keeps
/// running until it is killed.
pub async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => {
            #[cfg(not(windows))]
            println!();
            tracing::info!("Ctrl+C recieved. Please wait, this could take a while.");
        }
        Err(e) => {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}
