use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, load_settings_from, Content, HttpDocumentSource, Session, SessionController,
    TranslationPanel,
};
use shared::domain::{ViewMode, ViewState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse, preview and translate documents through the translation backend")]
struct Cli {
    /// Overrides `server_url` from the settings file and environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Settings file; defaults to `workstation.toml` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists the documents of a folder with their detected language.
    List { folder: String },
    /// Prints a document preview, or saves the page image with `--out`.
    View {
        path: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Show the markdown text view instead of the page image.
        #[arg(long)]
        text: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Starts a translation and follows it until it finishes.
    Translate {
        path: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Prints the stored translation of a document, or downloads the translated file
    /// with `--out`.
    Result {
        path: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Saves a file from the backend's download endpoint.
    Download { path: String, out: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings()?,
    };
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    info!(server_url = %settings.server_url, "workstation: using backend");
    let source = HttpDocumentSource::new(&settings.server_url)
        .with_context(|| format!("invalid server url {}", settings.server_url))?;

    if let Command::Download { path, .. } = &cli.command {
        println!("{}", source.download_url(path)?);
    }

    let controller = SessionController::new(Arc::new(source), settings);
    run(controller, cli.command).await
}

async fn run(mut controller: SessionController, command: Command) -> Result<()> {
    match command {
        Command::List { folder } => {
            controller.load_folder(&folder);
            if !controller.pump().await {
                bail!("session closed before the folder was scanned");
            }
            let session = controller.session();
            if let Some(err) = &session.folder_error {
                bail!("failed to scan {folder}: {}", err.message);
            }
            if let Some(message) = &session.folder_message {
                println!("{message}");
            }
            for document in &session.documents {
                let kind = format!("{:?}", document.kind);
                println!("{kind:<10} {}", document.badge_label());
            }
        }
        Command::View {
            path,
            page,
            text,
            out,
        } => {
            controller.open_path(&path);
            pump_until(&mut controller, |session| session.content.is_some()).await?;
            if text {
                if !controller.switch_view(ViewMode::Text) {
                    bail!("{path} has no text view");
                }
                pump_until(&mut controller, |session| session.content.is_some()).await?;
            } else if page > 1 {
                let delta = i32::try_from(page - 1).context("page out of range")?;
                if controller.navigate_page(delta) {
                    pump_until(&mut controller, |session| session.content.is_some()).await?;
                }
            }
            print_content(controller.session(), out).await?;
        }
        Command::Translate { path, out } => {
            controller.open_path(&path);
            controller.translate()?;
            let mut last_summary = String::new();
            loop {
                if !controller.pump().await {
                    bail!("session closed before the translation finished");
                }
                match &controller.session().panel {
                    TranslationPanel::Progress { file_name, snapshot } => {
                        let summary = format!(
                            "{file_name}: {}% ({})",
                            snapshot.percent,
                            snapshot.chunk_summary()
                        );
                        if summary != last_summary {
                            println!("{summary}");
                            last_summary = summary;
                        }
                    }
                    TranslationPanel::Finished { result, rendered } => {
                        match &out {
                            Some(out) => {
                                tokio::fs::write(&out, &result.content)
                                    .await
                                    .with_context(|| format!("failed to write {}", out.display()))?;
                                println!("saved translation to {}", out.display());
                            }
                            None => println!("{}", rendered.plain_text()),
                        }
                        println!("download path: {}", result.download_path());
                        break;
                    }
                    TranslationPanel::Failed { message, .. } => {
                        bail!("translation failed: {message}")
                    }
                    TranslationPanel::Empty
                    | TranslationPanel::Loading
                    | TranslationPanel::NotTranslated => {}
                }
            }
        }
        Command::Result { path, out } => {
            controller.open_path(&path);
            pump_until(&mut controller, |session| {
                !matches!(session.panel, TranslationPanel::Loading | TranslationPanel::Empty)
            })
            .await?;
            match &controller.session().panel {
                TranslationPanel::Finished { rendered, .. } => {
                    if rendered.degraded {
                        warn!(
                            path = %path,
                            "translation contains markdown that could not be rendered"
                        );
                    }
                    println!("{}", rendered.plain_text());
                }
                TranslationPanel::NotTranslated => println!("{path} has not been translated yet"),
                TranslationPanel::Failed { message, .. } => {
                    bail!("failed to load result: {message}")
                }
                other => bail!("unexpected translation state: {other:?}"),
            }
            if let Some(out) = out {
                let Some(remote) = controller.session().finished_download_path() else {
                    bail!("{path} has no translated file to download");
                };
                let remote = remote.to_string();
                let bytes = controller
                    .download(&remote)
                    .await
                    .with_context(|| format!("failed to download {remote}"))?;
                tokio::fs::write(&out, &bytes)
                    .await
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("saved {remote} to {}", out.display());
            }
        }
        Command::Download { path, out } => {
            let bytes = controller
                .download(&path)
                .await
                .with_context(|| format!("failed to download {path}"))?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("saved {} bytes to {}", bytes.len(), out.display());
        }
    }
    Ok(())
}

async fn pump_until(
    controller: &mut SessionController,
    done: impl Fn(&Session) -> bool,
) -> Result<()> {
    while !done(controller.session()) {
        if !controller.pump().await {
            bail!("session closed unexpectedly");
        }
    }
    Ok(())
}

async fn print_content(session: &Session, out: Option<PathBuf>) -> Result<()> {
    let Some(content) = &session.content else {
        bail!("no preview available");
    };
    match content {
        Content::Image {
            png,
            page,
            total_pages,
        } => {
            let out = out.unwrap_or_else(|| PathBuf::from(format!("page-{page}.png")));
            tokio::fs::write(&out, png)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("page {page}/{total_pages} saved to {}", out.display());
            print_page_hint(&session.view);
        }
        Content::RichText(rich) => println!("{}", rich.plain_text()),
        Content::PlainText(text) => println!("{text}"),
        Content::ErrorMessage { message, .. } => bail!("{message}"),
    }
    Ok(())
}

fn print_page_hint(view: &ViewState) {
    if view.page_controls_visible() {
        println!("use --page 1..={} to pick another page", view.total_pages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_view_flags() {
        let cli = Cli::try_parse_from([
            "workstation",
            "view",
            "/docs/a.pdf",
            "--page",
            "3",
            "--text",
        ])
        .expect("cli");
        assert!(matches!(
            cli.command,
            Command::View { page: 3, text: true, out: None, .. }
        ));
    }

    #[test]
    fn server_url_override_is_optional() {
        let cli = Cli::try_parse_from([
            "workstation",
            "--server-url",
            "http://10.0.0.2:5000",
            "list",
            "/docs",
        ])
        .expect("cli");
        assert_eq!(cli.server_url.as_deref(), Some("http://10.0.0.2:5000"));
        assert!(matches!(cli.command, Command::List { ref folder } if folder == "/docs"));
    }

    #[test]
    fn result_accepts_download_target() {
        let cli = Cli::try_parse_from(["workstation", "result", "/docs/a.pdf", "--out", "a.md"])
            .expect("cli");
        assert!(matches!(
            cli.command,
            Command::Result { ref path, out: Some(ref out) }
                if path == "/docs/a.pdf" && out == &PathBuf::from("a.md")
        ));
    }
}
