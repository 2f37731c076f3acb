//! Identifier normalization for messages and conversations.
//!
//! Providers hand out identifiers at different moments of a message's life:
//! the protocol-native id once the server has seen it, a local database row
//! id before that, and in the worst case nothing but the timestamp. Every
//! message must map to exactly one stable key for read-state purposes, so
//! the fallback order here is fixed and applied everywhere.

/// Prefix used by alias-form conversation identifiers.
const ALIAS_PREFIX: &str = "alias:";
/// Suffix used by linked-device alias identifiers on WhatsApp-style providers.
const LINKED_ID_SUFFIX: &str = "@lid";

/// Derive the stable read-state key for a message.
///
/// Priority: protocol-native id, then a synthesized row-id form, then a
/// timestamp-derived form.
pub fn message_key(protocol_id: Option<&str>, row_id: Option<i64>, timestamp_ms: u64) -> String {
    if let Some(id) = protocol_id {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return trimmed.to_owned();
        }
    }
    if let Some(row_id) = row_id {
        return format!("row-{row_id}");
    }
    format!("ts-{timestamp_ms}")
}

/// Whether a conversation identifier is in alias form and must be resolved
/// before any store lookup.
///
/// Canonical identifiers are provider-scoped and stable (for example a
/// phone-number JID or an opaque channel id); alias forms show up when a
/// provider addresses the same conversation through a secondary namespace.
pub fn is_alias_form(conversation_id: &str) -> bool {
    conversation_id.starts_with(ALIAS_PREFIX) || conversation_id.ends_with(LINKED_ID_SUFFIX)
}

/// Strip the alias marker to get the raw alias the resolver understands.
pub fn alias_body(conversation_id: &str) -> &str {
    conversation_id
        .strip_prefix(ALIAS_PREFIX)
        .unwrap_or(conversation_id)
}
