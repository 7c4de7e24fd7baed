#[tokio::main]
async fn main() {
    if let Err(err) = fitflow_lib::run().await {
        log::error!("fitflow failed: {err:#}");
        std::process::exit(1);
    }
}
