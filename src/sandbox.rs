use boa_engine::{Context, Source};
use eyre::{Result, eyre};
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

/// Minimal browser-scope shims. The vendor interpreter script expects
/// `window`/`document`-like globals; it only pokes at a handful of them.
const BROWSER_SHIMS: &str = r#"
globalThis.window = globalThis;
globalThis.self = globalThis;
globalThis.document = {
    documentElement: { style: {} },
    body: { style: {} },
    createElement: function () {
        return { style: {}, setAttribute: function () {}, appendChild: function () {} };
    },
    addEventListener: function () {},
    removeEventListener: function () {},
    currentScript: null,
};
globalThis.navigator = {
    userAgent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
    webdriver: false,
};
globalThis.location = { href: "https://www.youtube.com/", origin: "https://www.youtube.com" };
"#;

struct EvalRequest {
    script: String,
    reply: oneshot::Sender<Result<String, String>>,
}

/// Deliberately unsafe boundary: the only place third-party-controlled
/// script ever runs. The JS engine context is not `Send`, so the sandbox is
/// a dedicated thread owning the engine, addressed over channels. State
/// (globals installed by one script) persists across `eval` calls for the
/// lifetime of the sandbox.
pub struct Sandbox {
    tx: mpsc::UnboundedSender<EvalRequest>,
}

impl Sandbox {
    /// Spawn a fresh sandbox thread with the browser shims preinstalled
    pub fn start() -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<EvalRequest>();

        std::thread::Builder::new()
            .name("script-sandbox".to_string())
            .spawn(move || {
                let mut context = Context::default();
                if let Err(e) = context.eval(Source::from_bytes(BROWSER_SHIMS)) {
                    warn!("Failed to install browser shims: {e}");
                }
                while let Some(req) = rx.blocking_recv() {
                    let outcome = eval_to_string(&mut context, &req.script);
                    let _ = req.reply.send(outcome);
                }
                debug!("Script sandbox thread exiting");
            })
            .map_err(|e| eyre!("could not spawn script sandbox thread: {e}"))?;

        Ok(Sandbox { tx })
    }

    /// Evaluate a script, returning its completion value coerced to a string.
    /// `undefined`/`null` completions come back as the empty string.
    pub async fn eval(&self, script: String) -> Result<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EvalRequest {
                script,
                reply: reply_tx,
            })
            .map_err(|_| eyre!("script sandbox thread is gone"))?;

        reply_rx
            .await
            .map_err(|_| eyre!("script sandbox dropped the request"))?
            .map_err(|e| eyre!("script error: {e}"))
    }
}

fn eval_to_string(context: &mut Context, script: &str) -> Result<String, String> {
    let value = context
        .eval(Source::from_bytes(script))
        .map_err(|e| e.to_string())?;

    if value.is_undefined() || value.is_null() {
        return Ok(String::new());
    }

    value
        .to_string(context)
        .map(|s| s.to_std_string_escaped())
        .map_err(|e| e.to_string())
}
