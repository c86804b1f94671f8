use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::{Arg, ArgMatches, Command};
use objectops::{
    storage, BucketAttrs, ObjectStore, Provider, RequestContext, StorageError,
};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, span, Level};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let uri = || {
        Arg::new("URI")
            .required(true)
            .index(1)
            .help("gs://bucket or s3://bucket")
    };
    let project = || {
        Arg::new("project")
            .long("project")
            .env("GOOGLE_CLOUD_PROJECT")
            .help("project owning the buckets, unused for s3")
    };

    Command::new("objectops")
        .version(clap::crate_version!())
        .subcommand_required(true)
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .value_parser(clap::value_parser!(u64))
                .help("deadline for the whole command, in seconds"),
        )
        .subcommand(
            Command::new("create-bucket")
                .arg(uri())
                .arg(project())
                .arg(Arg::new("location").long("location"))
                .arg(Arg::new("storage-class").long("storage-class")),
        )
        .subcommand(Command::new("list-buckets").arg(uri()).arg(project()))
        .subcommand(Command::new("delete-bucket").arg(uri()))
        .subcommand(
            Command::new("upload")
                .arg(uri())
                .arg(
                    Arg::new("LOCAL_FILE")
                        .required(true)
                        .index(2)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(Arg::new("KEY").required(true).index(3)),
        )
        .subcommand(
            Command::new("read")
                .arg(uri())
                .arg(Arg::new("KEY").required(true).index(2))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("write to this file instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("list-objects")
                .arg(uri())
                .arg(Arg::new("prefix").long("prefix").default_value("")),
        )
}

/// Provider and bucket of the `URI` argument. `allow_empty` admits a bare `gs://`.
fn target(matches: &ArgMatches, allow_empty: bool) -> Result<(Provider, String), StorageError> {
    let uri = matches
        .get_one::<String>("URI")
        .ok_or_else(|| StorageError::InvalidArgument("missing URI".to_string()))?;

    let provider = objectops::parse_provider_from_uri(uri)?;
    let bucket = objectops::parse_bucket_from_uri(uri);
    if bucket.is_empty() && !allow_empty {
        return Err(StorageError::InvalidUri(uri.to_string()));
    }

    Ok((provider, bucket.to_string()))
}

fn project(matches: &ArgMatches, provider: Provider) -> Result<String, StorageError> {
    match matches.get_one::<String>("project") {
        Some(project) => Ok(project.clone()),
        None if provider.is_aws() => Ok(String::new()),
        None => Err(StorageError::InvalidArgument(
            "--project or GOOGLE_CLOUD_PROJECT is required for gs://".to_string(),
        )),
    }
}

async fn run(ctx: &RequestContext, matches: &ArgMatches) -> Result<(), StorageError> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| StorageError::InvalidArgument("missing subcommand".to_string()))?;

    let (provider, bucket) = target(sub, name == "list-buckets")?;
    let client: Box<dyn ObjectStore> = storage::create_client(ctx, provider).await?;
    let client = client.as_ref();

    match name {
        "create-bucket" => {
            let attrs = BucketAttrs {
                location: sub.get_one::<String>("location").cloned(),
                storage_class: sub.get_one::<String>("storage-class").cloned(),
            };
            let project = project(sub, provider)?;
            let created = storage::create_bucket(client, ctx, &project, &bucket, &attrs).await?;
            info!(bucket = bucket, created = created, "create-bucket done");
        }
        "list-buckets" => {
            let project = project(sub, provider)?;
            for name in storage::list_buckets(client, ctx, &project).await? {
                println!("{}", name);
            }
        }
        "delete-bucket" => {
            storage::delete_bucket(client, ctx, &bucket).await?;
        }
        "upload" => {
            let local_path = sub
                .get_one::<PathBuf>("LOCAL_FILE")
                .ok_or_else(|| StorageError::InvalidArgument("missing LOCAL_FILE".to_string()))?;
            let key = sub
                .get_one::<String>("KEY")
                .ok_or_else(|| StorageError::InvalidArgument("missing KEY".to_string()))?;
            storage::upload_local_file(client, ctx, &bucket, local_path, key).await?;
        }
        "read" => {
            let key = sub
                .get_one::<String>("KEY")
                .ok_or_else(|| StorageError::InvalidArgument("missing KEY".to_string()))?;
            let body = storage::read_object(client, ctx, &bucket, key).await?;

            match sub.get_one::<PathBuf>("output") {
                Some(path) => tokio::fs::write(path, &body).await.map_err(|source| {
                    StorageError::Io {
                        path: path.clone(),
                        source,
                    }
                })?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout
                        .write_all(&body)
                        .await
                        .and(stdout.flush().await)
                        .map_err(|source| StorageError::Io {
                            path: PathBuf::from("<stdout>"),
                            source,
                        })?;
                }
            }
        }
        "list-objects" => {
            let prefix = sub
                .get_one::<String>("prefix")
                .map(String::as_str)
                .unwrap_or("");
            for key in storage::list_objects_with_prefix(client, ctx, &bucket, prefix).await? {
                println!("{}", key);
            }
        }
        other => {
            return Err(StorageError::InvalidArgument(format!(
                "unknown subcommand: {}",
                other
            )));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let matches = cli().get_matches();

    let ctx = match matches.get_one::<u64>("timeout") {
        Some(secs) => RequestContext::with_timeout(Duration::from_secs(*secs)),
        None => RequestContext::background(),
    };

    let canceller = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    match run(&ctx, &matches).await {
        Err(err) => {
            error!(error_message=%err, error_group="main");
            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}
