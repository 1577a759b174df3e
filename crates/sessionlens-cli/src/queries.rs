//! GraphQL documents for the sessions and dialogs operations.

#![deny(clippy::all, clippy::pedantic)]

use sessionlens_api_types::GraphqlRequest;

use crate::args::{SessionsArgs, WindowArgs};

pub fn sessions(args: &SessionsArgs) -> GraphqlRequest {
    GraphqlRequest::new(format!(
        "query {{ QuerySessions(input: {{limit: {}, offset: {}, showAdmin: {}, showDeleted: {}, \
         createdAtStart: {}, createdAtEnd: {}}}) {{ totalCount list {{ id }} }} }}",
        args.limit, args.offset, args.show_admin, args.show_deleted, args.start, args.end,
    ))
}

pub fn dialogs(sid: &str, window: WindowArgs) -> GraphqlRequest {
    // JSON string escaping is valid GraphQL string escaping.
    let sid = serde_json::Value::String(sid.to_string());
    GraphqlRequest::new(format!(
        "query {{ Result: QueryDialogs(input: {{sid: {sid}, limit: {}, offset: 0, \
         showAdmin: true, showDeleted: true, createdAtStart: {}, createdAtEnd: {}}}) \
         {{ totalCount list {{ qid uid sid skillId question error createdAt updatedAt \
         deletedAt platform answer }} }} }}",
        window.limit, window.start, window.end,
    ))
}
