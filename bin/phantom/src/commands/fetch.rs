use anyhow::Context;
use phantom_core::{OpenSettings, ProcessConfig, Rect};
use phantom_host::{OutputSink, Process, WebPage};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Summary,
    Text,
    Content,
}

pub struct FetchArgs {
    pub url: String,
    pub method: String,
    pub data: Option<String>,
    pub clip: Option<Rect>,
    pub output: Output,
    pub show_engine_output: bool,
}

/// Run one engine for the duration of a single page load.
pub async fn run(config: ProcessConfig, args: FetchArgs) -> anyhow::Result<()> {
    let mut process = Process::new(config);
    if !args.show_engine_output {
        process = process
            .with_stdout(OutputSink::Null)
            .with_stderr(OutputSink::Null);
    }

    let outcome = session(&mut process, &args).await;
    let closed = process.close().await;
    if let Err(e) = &closed {
        warn!(error = %e, "Engine shutdown failed");
    }
    outcome?;
    closed?;
    Ok(())
}

async fn session(process: &mut Process, args: &FetchArgs) -> anyhow::Result<()> {
    process
        .open()
        .await
        .with_context(|| format!("engine did not start on {}", process.url()))?;
    info!(url = %process.url(), "Engine ready");

    let page = process.create_web_page().await?;
    let printed = load_and_print(&page, args).await;
    let closed = page.close().await;
    printed?;
    closed?;
    Ok(())
}

async fn load_and_print(page: &WebPage, args: &FetchArgs) -> anyhow::Result<()> {
    if let Some(rect) = args.clip {
        page.set_clip_rect(rect).await?;
    }

    let settings = OpenSettings {
        method: args.method.clone(),
        data: args.data.clone(),
    };
    page.open_with(&args.url, settings)
        .await
        .with_context(|| format!("failed to load {}", args.url))?;

    match args.output {
        Output::Text => println!("{}", page.plain_text().await?),
        Output::Content => println!("{}", page.content().await?),
        Output::Summary => {
            let clip = page.clip_rect().await?;
            println!("URL:   {}", page.url().await?);
            println!("Title: {}", page.title().await?);
            println!(
                "Clip:  top={} left={} width={} height={}",
                clip.top, clip.left, clip.width, clip.height
            );
        }
    }
    Ok(())
}

/// Parse `top,left,width,height`.
pub fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected top,left,width,height, got '{}'", s));
    }
    let mut values = [0i64; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{}' is not an integer", part))?;
    }
    Ok(Rect::new(values[0], values[1], values[2], values[3]))
}
