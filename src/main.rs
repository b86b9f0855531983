use std::path::Path;
use std::sync::Arc;

use bridgefs_client::bridge::{BridgeClient, BridgeTransport};
use bridgefs_client::blacklist::Blacklist;
use bridgefs_client::cli::{Cli, Commands};
use bridgefs_client::config::Config;
use bridgefs_client::{download, logging, ui, upload};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging_safe();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.clone())?;

    let transport = BridgeTransport::new(&config.bridge, config.connection_timeout())?;
    let client = BridgeClient::new(transport);
    let blacklist = Arc::new(Blacklist::load(&config.blacklist_folder).await?);

    match cli.command {
        Commands::Store { bucket, path, email } => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload.bin".to_string());
            let bucket_id = upload::normalize_bucket_id(&bucket, &email, &filename);

            ui::print_step(1, 1, &format!("storing {} into bucket {}", path.display(), bucket_id));
            let (_state, handle) =
                upload::store_file_in_bucket(client.clone(), blacklist, config, &bucket_id, path, &filename).await?;
            let response = handle
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))??;
            ui::print_success(&format!("stored: {}", response));
        }
        Commands::Get { bucket, file, output } => {
            ui::print_step(1, 1, &format!("downloading file {} from bucket {}", file, bucket));
            let mut muxer = download::create_file_stream(&client, &bucket, &file).await?;
            write_stream_to_file(&mut muxer, &output).await?;
            ui::print_success(&format!("wrote {}", output.display()));
        }
        Commands::Slice {
            bucket,
            file,
            start,
            end,
            output,
        } => {
            ui::print_step(1, 1, &format!("downloading range [{}, {}) of file {}", start, end, file));
            let mut slice = download::create_file_slice_stream(&client, &bucket, &file, start, end).await?;
            write_stream_to_file(&mut slice, &output).await?;
            ui::print_success(&format!("wrote {}", output.display()));
        }
    }

    Ok(())
}

async fn write_stream_to_file<R>(source: &mut R, output: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncWriteExt;
    let mut dest = tokio::fs::File::create(output).await?;
    tokio::io::copy(source, &mut dest).await?;
    dest.flush().await?;
    Ok(())
}
