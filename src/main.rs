use anyhow::Result;
use clap::Parser;
use task_engine::cli::{
    execute_cancel, execute_fan_in, execute_pool, execute_posts, execute_select, load_posts,
    report_failure, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    task_engine::logging::init()?;

    let cli = Cli::parse();
    let outcome = run(cli).await;
    if let Err(error) = &outcome {
        report_failure(error);
    }
    outcome
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.engine.resolve()?;

    match cli.command {
        Commands::Pool { tasks, json } => execute_pool(config, tasks, json).await,
        Commands::FanIn {
            sources,
            length,
            fan_out,
        } => execute_fan_in(&config, sources, length, fan_out)
            .await
            .map(|_| ()),
        Commands::Select { delays, wait } => execute_select(&delays, wait).await.map(|_| ()),
        Commands::Cancel { after, interval } => execute_cancel(after, interval).await.map(|_| ()),
        Commands::Posts { file } => {
            let posts = load_posts(file.as_deref())?;
            execute_posts(config, posts).await.map(|_| ())
        }
    }
}
