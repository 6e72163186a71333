use futures::TryStreamExt;
use log::{error, info, LevelFilter};
use serde::Serialize;
use wwweather::{
    export_file, get_config_info, get_log_level, import_file, open_repository, search,
    setup_logger, Command, CsvOptions, RecordRepository, SearchQuery,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = get_config_info()?;
    let log_level = get_log_level(&cli.settings);

    setup_logger()
        .level(log_level)
        .level_for("wwweather", log_level)
        .level_for("sqlx", LevelFilter::Warn)
        .apply()?;

    if let Some(source) = &cli.config_source {
        info!("Config: {}", source);
    }

    let config = cli.settings.repository_config();
    let repository = open_repository(&config).await.map_err(|e| {
        error!("error opening repository: {}", e);
        e
    })?;

    let options = CsvOptions {
        batch_size: config.batch_size,
        ..CsvOptions::default()
    };
    let result = run(cli.command, repository.as_ref(), &options).await;
    repository.release().await;
    result
}

async fn run(
    command: Command,
    repository: &dyn RecordRepository,
    options: &CsvOptions,
) -> anyhow::Result<()> {
    match command {
        Command::Import {
            path,
            on_duplicate,
            filter,
        } => {
            let filter = filter.to_filter()?;
            let filter = (!filter.is_empty()).then_some(&filter);
            let options = CsvOptions {
                on_duplicate,
                ..options.clone()
            };
            let report = import_file(repository, &path, filter, &options).await?;
            print_json(&report)?;
        }
        Command::Export {
            path,
            append,
            filter,
        } => {
            let options = CsvOptions {
                append,
                ..options.clone()
            };
            let report = export_file(repository, &path, filter.to_filter()?, &options).await?;
            print_json(&report)?;
        }
        Command::Search {
            filter,
            offset,
            limit,
        } => {
            let mut query = SearchQuery::new(filter.to_filter()?).offset(offset);
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            let mut records = search(repository, query);
            while let Some(record) = records.try_next().await? {
                let id = record.id().map(|id| id.to_string()).unwrap_or_default();
                println!("{}\t{}", id, record);
            }
        }
        Command::Count { filter } => {
            println!("{}", repository.count(&filter.to_filter()?).await?);
        }
        Command::Get { id } => {
            println!("{}\t{}", id, repository.get(id).await?);
        }
        Command::Delete { id } => {
            let deleted = repository.delete(id).await?;
            print_json(&serde_json::json!({ "id": id.to_string(), "deleted": deleted }))?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
