//! Streaming HTML URL rewriting.
//!
//! # Responsibilities
//! - Prepend `<base href="{base}/">` as the first child of `<head>`
//! - Map absolute self-references of the proxied origin onto the public path
//! - Prefix root-relative `href`/`src` values with the base path
//! - Rewrite absolute `meta[content]` URLs (Open Graph and friends)
//!
//! # Design Decisions
//! - lol_html visits elements as they stream by; the body is never buffered
//! - The `Send` flavour of the rewriter runs inside an ordinary task and
//!   awaits a bounded channel, so it never reads faster than the client drains
//!   and never parks a thread while waiting
//! - Client disconnect aborts the rewrite and drops the upstream body
//! - Upstream read errors surface as body errors, never as a truncated page

use axum::body::Body;
use bytes::Bytes;
use futures_util::StreamExt;
use lol_html::send::{Element, HtmlRewriter, Settings};
use lol_html::{element, html_content::ContentType, OutputSink};
use tokio::sync::mpsc;
use url::{Origin, Position, Url};

/// Rewritten chunks buffered ahead of the client.
const CHANNEL_DEPTH: usize = 8;

/// How a link attribute value relates to the document's location.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkKind {
    Absolute(Url),
    /// Starts with a single `/`.
    RootRelative,
    /// `./x`, `../x`, `x`, `#frag`, `?q` and protocol-relative `//host/x`.
    Relative,
}

pub fn classify_link(value: &str) -> LinkKind {
    match Url::parse(value) {
        Ok(url) => LinkKind::Absolute(url),
        Err(_) if value.starts_with('/') && !value.starts_with("//") => LinkKind::RootRelative,
        Err(_) => LinkKind::Relative,
    }
}

/// Everything the rewriter needs to know about one proxied response.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    base_path: String,
    source_origin: String,
    target_origin: Origin,
}

impl RewriteContext {
    /// `base_path` is the route's mount point without a trailing slash;
    /// `source` is the public request URL and `target` the proxied one.
    pub fn new(base_path: &str, source: &Url, target: &Url) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            source_origin: source.origin().ascii_serialization(),
            target_origin: target.origin(),
        }
    }

    pub fn base_href(&self) -> String {
        format!("{}/", self.base_path)
    }

    pub fn base_tag(&self) -> String {
        format!(r#"<base href="{}">"#, escape_attribute(&self.base_href()))
    }

    /// New value for an `href`/`src` attribute, or `None` to leave it.
    pub fn rewrite_link(&self, value: &str) -> Option<String> {
        match classify_link(value) {
            LinkKind::Absolute(url) => self.rewrite_absolute(&url),
            LinkKind::RootRelative => Some(format!("{}{}", self.base_path, value)),
            LinkKind::Relative => None,
        }
    }

    /// New value for a `meta` `content` attribute, or `None` to leave it.
    pub fn rewrite_meta_content(&self, value: &str) -> Option<String> {
        match classify_link(value) {
            LinkKind::Absolute(url) => self.rewrite_absolute(&url),
            LinkKind::RootRelative | LinkKind::Relative => None,
        }
    }

    fn rewrite_absolute(&self, url: &Url) -> Option<String> {
        if url.origin() != self.target_origin {
            return None;
        }
        Some(format!(
            "{}{}{}",
            self.source_origin,
            self.base_path,
            &url[Position::BeforePath..]
        ))
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn build_rewriter<'h, O: OutputSink>(ctx: &'h RewriteContext, sink: O) -> HtmlRewriter<'h, O> {
    let base_tag = ctx.base_tag();

    HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("head", move |el: &mut Element<'_, '_>| {
                    el.prepend(&base_tag, ContentType::Html);
                    Ok(())
                }),
                element!("[href]", move |el: &mut Element<'_, '_>| {
                    if let Some(value) = el.get_attribute("href").and_then(|v| ctx.rewrite_link(&v)) {
                        el.set_attribute("href", &value)?;
                    }
                    Ok(())
                }),
                element!("[src]", move |el: &mut Element<'_, '_>| {
                    if let Some(value) = el.get_attribute("src").and_then(|v| ctx.rewrite_link(&v)) {
                        el.set_attribute("src", &value)?;
                    }
                    Ok(())
                }),
                element!("meta[content]", move |el: &mut Element<'_, '_>| {
                    if let Some(value) = el
                        .get_attribute("content")
                        .and_then(|v| ctx.rewrite_meta_content(&v))
                    {
                        el.set_attribute("content", &value)?;
                    }
                    Ok(())
                }),
            ],
            ..Settings::new_send()
        },
        sink,
    )
}

/// Rewrite a complete document held in memory.
pub fn rewrite_document(
    html: &[u8],
    ctx: &RewriteContext,
) -> Result<Vec<u8>, lol_html::errors::RewritingError> {
    let mut output = Vec::with_capacity(html.len() + 64);
    let mut rewriter = build_rewriter(ctx, |chunk: &[u8]| output.extend_from_slice(chunk));
    rewriter.write(html)?;
    rewriter.end()?;
    Ok(output)
}

/// Rewrite a streaming body, returning a body that yields rewritten chunks
/// as they become available.
pub fn rewrite_body(body: Body, ctx: RewriteContext) -> Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, axum::Error>>(CHANNEL_DEPTH);
    tokio::spawn(stream_rewrite(body, ctx, tx));

    Body::from_stream(futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

async fn stream_rewrite(body: Body, ctx: RewriteContext, tx: mpsc::Sender<Result<Bytes, axum::Error>>) {
    // The sink runs synchronously inside `write`; its output is drained into
    // the bounded channel after every call.
    let (sink_tx, mut output) = mpsc::unbounded_channel::<Bytes>();
    let mut rewriter = build_rewriter(&ctx, move |chunk: &[u8]| {
        let _ = sink_tx.send(Bytes::copy_from_slice(chunk));
    });
    let mut upstream = body.into_data_stream();

    loop {
        let chunk = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("Client went away; aborting HTML rewrite");
                return;
            }
            chunk = upstream.next() => chunk,
        };

        let result = match chunk {
            Some(Ok(bytes)) => rewriter.write(&bytes).map_err(axum::Error::new),
            Some(Err(e)) => Err(e),
            None => break,
        };

        if !drain_output(&mut output, &tx).await {
            tracing::debug!("Client went away; aborting HTML rewrite");
            return;
        }
        if let Err(e) = result {
            tracing::warn!(error = %e, "HTML rewrite failed mid-stream");
            let _ = tx.send(Err(e)).await;
            return;
        }
    }

    let result = rewriter.end();
    if !drain_output(&mut output, &tx).await {
        return;
    }
    if let Err(e) = result {
        tracing::warn!(error = %e, "HTML rewrite failed at end of document");
        let _ = tx.send(Err(axum::Error::new(e))).await;
    }
}

/// Forward everything the sink produced. `false` once the client is gone.
async fn drain_output(
    output: &mut mpsc::UnboundedReceiver<Bytes>,
    tx: &mpsc::Sender<Result<Bytes, axum::Error>>,
) -> bool {
    while let Ok(chunk) = output.try_recv() {
        if tx.send(Ok(chunk)).await.is_err() {
            return false;
        }
    }
    true
}
