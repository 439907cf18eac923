//! Terminal implementations of the authorization flow's interactive steps
//!
//! Prompts go to stderr so stdout stays reserved for command output.

use std::io::{self, BufRead, Write};

use tracing::debug;
use yahoo_auth::{CodePrompt, PromptFuture, UrlOpener};

/// Prints the authorization URL and tries to open it in the default browser.
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) {
        eprintln!("\nAuthorize this application by visiting:\n\n  {url}\n");
        if let Err(e) = open::that(url) {
            debug!(error = %e, "could not open a browser");
        }
    }
}

/// Reads one line from stdin.
///
/// The read runs on a plain thread: a blocking read parked on the runtime's
/// blocking pool would hold up shutdown after the flow times out.
pub struct StdinPrompt;

impl CodePrompt for StdinPrompt {
    fn read_code<'a>(&'a self, _authorization_url: &'a str) -> PromptFuture<'a> {
        Box::pin(async move {
            let (tx, rx) = tokio::sync::oneshot::channel();
            std::thread::spawn(move || {
                eprint!("Enter the authorization code (or the full redirect URL): ");
                let _ = io::stderr().flush();
                let mut line = String::new();
                let result = io::stdin().lock().read_line(&mut line).map(|_| line);
                let _ = tx.send(result);
            });
            rx.await
                .map_err(|_| io::Error::other("code prompt thread exited"))?
        })
    }
}
