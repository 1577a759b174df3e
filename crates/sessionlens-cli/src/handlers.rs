#![deny(clippy::all, clippy::pedantic)]

use serde_json::{Map, Value, json};

use crate::args::{DialogsArgs, DialogsForArgs, SessionsArgs, WindowArgs};
use crate::client::{CliError, Ctx};
use crate::queries;

pub async fn sessions(ctx: &Ctx, args: &SessionsArgs) -> Result<Value, CliError> {
    let response = ctx.execute(&queries::sessions(args)).await?;
    if !args.include_dialogs {
        return Ok(response);
    }

    let listing = response
        .pointer("/data/QuerySessions")
        .cloned()
        .unwrap_or_else(|| json!({}));
    let session_ids: Vec<String> = listing
        .get("list")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|session| session.get("id"))
                .map(|id| match id {
                    Value::String(id) => id.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let window = WindowArgs {
        start: args.start,
        end: args.end,
        limit: args.dialog_limit,
    };
    let dialogs = dialogs_by_session(ctx, &session_ids, window).await;

    Ok(json!({ "sessions": listing, "dialogs": dialogs }))
}

pub async fn dialogs(ctx: &Ctx, args: &DialogsArgs) -> Result<Value, CliError> {
    ctx.execute(&queries::dialogs(&args.sid, args.window)).await
}

pub async fn dialogs_for(ctx: &Ctx, args: &DialogsForArgs) -> Result<Value, CliError> {
    let session_ids: Vec<String> = args
        .session_ids
        .iter()
        .map(|sid| sid.trim().to_string())
        .filter(|sid| !sid.is_empty())
        .collect();
    if session_ids.is_empty() {
        return Err(CliError::InvalidInput("no session ids given".into()));
    }

    let sessions = dialogs_by_session(ctx, &session_ids, args.window).await;
    Ok(json!({ "sessions": sessions }))
}

/// Per-session failures are recorded under that session as `{"error": ...}`.
async fn dialogs_by_session(ctx: &Ctx, session_ids: &[String], window: WindowArgs) -> Value {
    let mut grouped = Map::new();
    for sid in session_ids {
        let entry = match ctx.execute(&queries::dialogs(sid, window)).await {
            Ok(response) => response
                .pointer("/data/Result")
                .cloned()
                .unwrap_or_else(|| json!({})),
            Err(err) => json!({ "error": err.to_string() }),
        };
        grouped.insert(sid.clone(), entry);
    }
    Value::Object(grouped)
}
