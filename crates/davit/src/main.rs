use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = davit::cli::DavitArgs::parse();

    davit::run(args).await
}
