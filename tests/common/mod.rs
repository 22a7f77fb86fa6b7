//! Snapshot and session builders shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use pixi_browse::index::{
    ChannelReference, FreshnessToken, IndexSnapshot, QuerySpec, RefreshCompletion, RefreshOutcome,
    RefreshRequest, parse_snapshot,
};
use pixi_browse::state::{Session, SessionHandle, new_session};
use tokio::sync::mpsc;

/// Channel partition on a fake origin.
pub fn channel(subdir: &str) -> ChannelReference {
    ChannelReference::new("https://conda.example.org/forge", subdir)
}

/// Decode a `repodata.json` built from `(name, version, build)` triples.
pub fn snapshot(channel: &ChannelReference, entries: &[(&str, &str, &str)]) -> Arc<IndexSnapshot> {
    let packages: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(n, v, b)| {
            (
                format!("{n}-{v}-{b}.conda"),
                serde_json::json!({
                    "name": n,
                    "version": v,
                    "build": b,
                    "build_number": 0,
                    "depends": ["python >=3.9"],
                    "size": 2048,
                }),
            )
        })
        .collect();
    let raw = serde_json::to_vec(&serde_json::json!({
        "info": {"subdir": channel.subdir()},
        "packages.conda": packages,
    }))
    .expect("serialize repodata");
    let token = FreshnessToken {
        etag: Some(format!("\"{}\"", entries.len())),
        last_modified: None,
    };
    Arc::new(parse_snapshot(&raw, channel, token, 1_700_000_000).expect("valid repodata"))
}

/// Names `pkg-000` .. `pkg-NNN` with a few versions each, plus some real-looking names.
pub fn corpus() -> Vec<(String, String, String)> {
    let mut out = Vec::new();
    for i in 0..40 {
        for v in 0..(i % 3 + 1) {
            out.push((format!("pkg-{i:03}"), format!("1.{v}.0"), "0".to_string()));
        }
    }
    for name in ["numpy", "numpy-base", "numba", "pynum", "scipy", "NumExpr"] {
        out.push((name.to_string(), "2.0".to_string(), "py_0".to_string()));
        out.push((name.to_string(), "1.9".to_string(), "py_0".to_string()));
    }
    out
}

/// Borrowed view of [`corpus`] entries for [`snapshot`].
pub fn as_entries(corpus: &[(String, String, String)]) -> Vec<(&str, &str, &str)> {
    corpus
        .iter()
        .map(|(n, v, b)| (n.as_str(), v.as_str(), b.as_str()))
        .collect()
}

/// Started session over `channels` with its outstanding requests drained.
pub fn started(
    channels: Vec<ChannelReference>,
    text: &str,
    page_size: usize,
) -> (Session, mpsc::UnboundedReceiver<RefreshRequest>, Vec<RefreshRequest>) {
    let SessionHandle {
        mut session,
        mut requests,
        ..
    } = new_session(channels, QuerySpec::new(text, page_size));
    session.start();
    let issued = drain(&mut requests);
    (session, requests, issued)
}

/// Every request currently queued.
pub fn drain(requests: &mut mpsc::UnboundedReceiver<RefreshRequest>) -> Vec<RefreshRequest> {
    let mut out = Vec::new();
    while let Ok(r) = requests.try_recv() {
        out.push(r);
    }
    out
}

/// Completion for `request` carrying `outcome`.
pub fn complete(request: &RefreshRequest, outcome: RefreshOutcome) -> RefreshCompletion {
    RefreshCompletion {
        channel: request.channel.clone(),
        generation: request.generation,
        outcome,
    }
}
