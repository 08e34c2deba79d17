//! HTML tree construction for fetched pages
//!
//! Bodies are decoded (lossy UTF-8) and fed into an html5ever tree builder.
//! Streamed bodies are parsed on the blocking pool while chunks are still
//! arriving; the async side only forwards bytes. The resulting `scraper::Html`
//! never leaves the parsing thread: callers hand in an extraction closure and
//! get its output back.

use crate::FetchError;
use html5ever::driver::{self, ParseOpts, Parser};
use html5ever::tendril::stream::Utf8LossyDecoder;
use html5ever::tendril::{ByteTendril, TendrilSink};
use html5ever::{LocalName, Namespace, QualName};
use scraper::Html;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Message reported when a response carried no markup at all
pub const NO_DOCUMENT: &str = "No Document parsed";

/// Message reported when the body stream broke off mid-document
pub const NOT_LOADED: &str = "Document could not be loaded";

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// How markup is turned into a tree
///
/// Some sites serve markup that one strategy mangles and the other does not, so
/// the choice is made per site hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Full HTML document construction, including implied `html`/`head`/`body`
    #[default]
    Document,
    /// Tolerant fragment construction in a `body` context, for partial markup
    /// such as AJAX chapter lists
    Fragment,
}

type TreeBuilder = Utf8LossyDecoder<Parser<Html>>;

fn tree_builder(kind: ParserKind) -> TreeBuilder {
    match kind {
        ParserKind::Document => {
            driver::parse_document(Html::new_document(), ParseOpts::default()).from_utf8()
        }
        ParserKind::Fragment => driver::parse_fragment(
            Html::new_fragment(),
            ParseOpts::default(),
            QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body")),
            Vec::new(),
        )
        .from_utf8(),
    }
}

/// Parses a fully buffered body and runs `extract` on the resulting tree
///
/// # Returns
///
/// * `Ok(R)` - Output of `extract`
/// * `Err(FetchError::Parse)` - The body was empty
pub fn parse_buffered<F, R>(url: &str, kind: ParserKind, body: &[u8], extract: F) -> Result<R, FetchError>
where
    F: FnOnce(&Html) -> R,
{
    if body.is_empty() {
        return Err(parse_error(url, NO_DOCUMENT));
    }

    let html = tree_builder(kind).one(ByteTendril::from_slice(body));
    Ok(extract(&html))
}

fn parse_error(url: &str, message: impl Into<String>) -> FetchError {
    FetchError::Parse {
        url: url.to_string(),
        message: message.into(),
    }
}

enum Feed {
    Chunk(Vec<u8>),
    Abort,
}

/// An in-progress streaming parse running on the blocking pool
pub(crate) struct StreamingParse<R> {
    sender: mpsc::Sender<Feed>,
    handle: JoinHandle<Option<Result<R, &'static str>>>,
}

impl<R: Send + 'static> StreamingParse<R> {
    /// Spawns the tree builder; `extract` runs once the body is complete
    pub fn start<F>(kind: ParserKind, extract: F) -> Self
    where
        F: FnOnce(&Html) -> R + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<Feed>(16);
        let handle = tokio::task::spawn_blocking(move || {
            let mut builder = tree_builder(kind);
            let mut received = 0usize;

            while let Some(feed) = receiver.blocking_recv() {
                match feed {
                    Feed::Chunk(chunk) => {
                        received += chunk.len();
                        builder.process(ByteTendril::from_slice(&chunk));
                    }
                    Feed::Abort => return None,
                }
            }

            if received == 0 {
                return Some(Err(NO_DOCUMENT));
            }
            let html = builder.finish();
            Some(Ok(extract(&html)))
        });

        Self { sender, handle }
    }

    /// Forwards a body chunk to the tree builder
    ///
    /// Returns false if the builder has gone away, in which case the caller
    /// should stop reading and call [`StreamingParse::finish`].
    pub async fn feed(&self, chunk: Vec<u8>) -> bool {
        self.sender.send(Feed::Chunk(chunk)).await.is_ok()
    }

    /// Tells the builder the body broke off; no extraction happens
    pub async fn abort(self) {
        let _ = self.sender.send(Feed::Abort).await;
    }

    /// Signals end of body and waits for the extraction result
    pub async fn finish(self, url: &str) -> Result<R, FetchError> {
        drop(self.sender);
        match self.handle.await {
            Ok(Some(Ok(output))) => Ok(output),
            Ok(Some(Err(message))) => Err(parse_error(url, message)),
            Ok(None) => Err(parse_error(url, NOT_LOADED)),
            Err(e) => Err(parse_error(url, format!("{}: {}", NOT_LOADED, e))),
        }
    }
}
