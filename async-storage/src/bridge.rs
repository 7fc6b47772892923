//! Host-facing module: untyped JSON arguments in, one callback out.

use crate::{AsyncStorage, Key, KeyRange, Result, StoreError, StoreErrorKind, Value};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tokio::runtime::Handle;
use tracing::debug;

/// Completion handler receiving the [`Reply`] of one request
pub type Callback = Box<dyn FnOnce(Reply) + Send + 'static>;

/// A host request: the method to run and its still untyped arguments.
///
/// ```json
/// { "method": "multiGet", "args": ["k1", "k2"] }
/// { "method": "getAllKeysInRange", "args": { "lower": "b", "upper": "d" } }
/// { "method": "clear" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum Request {
    /// array of keys
    MultiGet(Json),
    /// array of `[key, value]` string pairs
    MultiSet(Json),
    /// array of keys
    MultiRemove(Json),
    /// no arguments
    Clear,
    /// no arguments
    GetAllKeys,
    /// prefix string
    GetAllKeysWithPrefix(Json),
    /// `[lower, upper]` for `[lower, upper)`, or an object with explicit
    /// `lowerInclusive` (default true) and `upperInclusive` (default false)
    GetAllKeysInRange(Json),
}

impl Request {
    /// decode a request from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// wire name of the method
    pub fn method(&self) -> &'static str {
        match self {
            Request::MultiGet(_) => "multiGet",
            Request::MultiSet(_) => "multiSet",
            Request::MultiRemove(_) => "multiRemove",
            Request::Clear => "clear",
            Request::GetAllKeys => "getAllKeys",
            Request::GetAllKeysWithPrefix(_) => "getAllKeysWithPrefix",
            Request::GetAllKeysInRange(_) => "getAllKeysInRange",
        }
    }
}

/// Error half of a [`Reply`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// `validation` or `storage`
    pub category: String,
    /// stable snake_case error code
    pub code: String,
    /// human readable message
    pub message: String,
}

impl From<&StoreError> for ErrorPayload {
    fn from(err: &StoreError) -> Self {
        Self {
            category: err.category().as_str().to_owned(),
            code: err.kind().code().to_owned(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a request, success payload or error payload, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Reply {
    /// the operation completed
    Success {
        /// method specific payload, `null` for writes
        result: Json,
    },
    /// the operation failed
    Failure {
        /// what went wrong
        error: ErrorPayload,
    },
}

impl Reply {
    /// true for [`Reply::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }

    /// payload of a success
    pub fn result(&self) -> Option<&Json> {
        match self {
            Reply::Success { result } => Some(result),
            Reply::Failure { .. } => None,
        }
    }

    /// payload of a failure
    pub fn error(&self) -> Option<&ErrorPayload> {
        match self {
            Reply::Success { .. } => None,
            Reply::Failure { error } => Some(error),
        }
    }
}

impl From<StoreError> for Reply {
    fn from(err: StoreError) -> Self {
        Reply::Failure {
            error: ErrorPayload::from(&err),
        }
    }
}

impl From<Result<Json>> for Reply {
    fn from(res: Result<Json>) -> Self {
        match res {
            Ok(result) => Reply::Success { result },
            Err(err) => Reply::from(err),
        }
    }
}

/// Bridge between a host runtime and an [`AsyncStorage`].
///
/// Requests run on the tokio runtime behind `runtime`; each callback is
/// invoked exactly once, from a runtime thread.
#[derive(Clone)]
pub struct StorageModule<S: AsyncStorage> {
    store: S,
    runtime: Handle,
}

impl<S: AsyncStorage> StorageModule<S> {
    /// bridge `store`, running requests on `runtime`
    pub fn new(store: S, runtime: Handle) -> Self {
        Self { store, runtime }
    }

    /// the bridged store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// run `request` and resolve to its reply
    pub fn call(&self, request: Request) -> BoxFuture<'static, Reply> {
        // the store is cloned so the future does not borrow the module
        let store = self.store.clone();
        async move {
            let method = request.method();
            let reply = Reply::from(execute(&store, request).await);
            debug!("{} finished, success: {}", method, reply.is_success());
            reply
        }
        .boxed()
    }

    /// run `request` in the background and hand the reply to `callback`
    pub fn dispatch(&self, request: Request, callback: Callback) {
        let reply = self.call(request);
        self.runtime.spawn(async move {
            callback(reply.await);
        });
    }

    /// decode `json` and dispatch it. A request that does not decode is
    /// answered right away with a validation failure.
    pub fn dispatch_json(&self, json: &str, callback: Callback) {
        match Request::from_json(json) {
            Ok(request) => self.dispatch(request, callback),
            Err(err) => callback(Reply::from(err)),
        }
    }

    /// `multiGet`: replies with `[[key, value or null], ...]` in input order
    pub fn multi_get(&self, keys: Json, callback: Callback) {
        self.dispatch(Request::MultiGet(keys), callback)
    }

    /// `multiSet`: atomically writes `[[key, value], ...]`
    pub fn multi_set(&self, kv_pairs: Json, callback: Callback) {
        self.dispatch(Request::MultiSet(kv_pairs), callback)
    }

    /// `multiRemove`: atomically deletes `[key, ...]`
    pub fn multi_remove(&self, keys: Json, callback: Callback) {
        self.dispatch(Request::MultiRemove(keys), callback)
    }

    /// `clear`: removes every entry
    pub fn clear(&self, callback: Callback) {
        self.dispatch(Request::Clear, callback)
    }

    /// `getAllKeys`: replies with every key, ascending
    pub fn get_all_keys(&self, callback: Callback) {
        self.dispatch(Request::GetAllKeys, callback)
    }

    /// `getAllKeysWithPrefix`
    pub fn get_all_keys_with_prefix(&self, prefix: Json, callback: Callback) {
        self.dispatch(Request::GetAllKeysWithPrefix(prefix), callback)
    }

    /// `getAllKeysInRange`
    pub fn get_all_keys_in_range(&self, range: Json, callback: Callback) {
        self.dispatch(Request::GetAllKeysInRange(range), callback)
    }
}

async fn execute<S: AsyncStorage>(store: &S, request: Request) -> Result<Json> {
    match request {
        Request::MultiGet(args) => {
            let keys = parse_keys(args, "keys")?;
            let pairs = store.multi_get(keys).await?;
            let rows = pairs
                .into_iter()
                .map(|(key, val)| -> Result<Json> {
                    let val = match val {
                        Some(bytes) => Json::String(decode_value(&key, bytes)?),
                        None => Json::Null,
                    };
                    Ok(json!([key, val]))
                })
                .collect::<Result<Vec<Json>>>()?;
            Ok(Json::Array(rows))
        }
        Request::MultiSet(args) => {
            let entries = parse_entries(args)?;
            store.multi_set(entries).await?;
            Ok(Json::Null)
        }
        Request::MultiRemove(args) => {
            let keys = parse_keys(args, "keys")?;
            store.multi_remove(keys).await?;
            Ok(Json::Null)
        }
        Request::Clear => {
            store.clear().await?;
            Ok(Json::Null)
        }
        Request::GetAllKeys => Ok(json!(store.get_all_keys().await?)),
        Request::GetAllKeysWithPrefix(args) => {
            let prefix = expect_string(args, "prefix")?;
            Ok(json!(store.get_all_keys_with_prefix(prefix).await?))
        }
        Request::GetAllKeysInRange(args) => {
            let range = parse_range(args)?;
            Ok(json!(store.get_all_keys_in_range(range).await?))
        }
    }
}

fn invalid_argument(detail: String) -> StoreError {
    StoreError::new(StoreErrorKind::InvalidArgument, detail)
}

fn type_name(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn expect_string(json: Json, what: &str) -> Result<String> {
    match json {
        Json::String(s) => Ok(s),
        other => Err(invalid_argument(format!(
            "{} must be a string, got {}",
            what,
            type_name(&other)
        ))),
    }
}

fn expect_array(json: Json, what: &str) -> Result<Vec<Json>> {
    match json {
        Json::Array(items) => Ok(items),
        other => Err(invalid_argument(format!(
            "{} must be an array, got {}",
            what,
            type_name(&other)
        ))),
    }
}

fn parse_keys(args: Json, what: &str) -> Result<Vec<Key>> {
    expect_array(args, what)?
        .into_iter()
        .enumerate()
        .map(|(i, item)| expect_string(item, &format!("{}[{}]", what, i)))
        .collect()
}

fn parse_entries(args: Json) -> Result<Vec<(Key, Value)>> {
    expect_array(args, "kvPairs")?
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let mut pair = expect_array(item, &format!("kvPairs[{}]", i))?;
            match (pair.pop(), pair.pop(), pair.pop()) {
                (Some(val), Some(key), None) => {
                    let key = expect_string(key, &format!("kvPairs[{}][0]", i))?;
                    let val = expect_string(val, &format!("kvPairs[{}][1]", i))?;
                    Ok((key, val.into_bytes()))
                }
                _ => Err(invalid_argument(format!(
                    "kvPairs[{}] must hold exactly a key and a value",
                    i
                ))),
            }
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeArgs {
    Pair(Key, Key),
    Object(RangeObject),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RangeObject {
    lower: Key,
    upper: Key,
    #[serde(default = "included")]
    lower_inclusive: bool,
    #[serde(default)]
    upper_inclusive: bool,
}

fn included() -> bool {
    true
}

fn parse_range(args: Json) -> Result<KeyRange> {
    let args: RangeArgs = serde_json::from_value(args).map_err(|_| {
        invalid_argument(
            "range must be [lower, upper] or {lower, upper, lowerInclusive, upperInclusive}"
                .to_owned(),
        )
    })?;
    Ok(match args {
        RangeArgs::Pair(lower, upper) => KeyRange::half_open(lower, upper),
        RangeArgs::Object(obj) => KeyRange::new(
            obj.lower,
            obj.upper,
            obj.lower_inclusive,
            obj.upper_inclusive,
        ),
    })
}

fn decode_value(key: &str, bytes: Value) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| {
        StoreError::new(
            StoreErrorKind::CorruptedValue,
            format!("value of {} is not valid UTF-8", key),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Bound;

    #[test]
    fn keys_must_be_strings() {
        let err = parse_keys(json!(["a", 1]), "keys").unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::InvalidArgument);
        assert_eq!(err.detail().as_deref(), Some("keys[1] must be a string, got number"));

        let err = parse_keys(json!("a"), "keys").unwrap_err();
        assert_eq!(err.detail().as_deref(), Some("keys must be an array, got string"));
    }

    #[test]
    fn entries_must_be_pairs() {
        let entries = parse_entries(json!([["k1", "v1"], ["k2", ""]])).unwrap();
        assert_eq!(
            entries,
            vec![("k1".to_owned(), b"v1".to_vec()), ("k2".to_owned(), Vec::new())]
        );

        for bad in &[json!([["k1"]]), json!([["k1", "v1", "x"]]), json!([["k1", null]])] {
            let err = parse_entries(bad.clone()).unwrap_err();
            assert_eq!(err.kind(), StoreErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn range_pair_is_half_open() {
        let range = parse_range(json!(["b", "d"])).unwrap();
        assert_eq!(range, KeyRange::half_open("b".into(), "d".into()));
    }

    #[test]
    fn range_object_defaults_to_half_open() {
        let range = parse_range(json!({ "lower": "b", "upper": "d" })).unwrap();
        assert_eq!(range.lower(), Bound::Included("b"));
        assert_eq!(range.upper(), Bound::Excluded("d"));

        let range = parse_range(json!({
            "lower": "b",
            "upper": "d",
            "lowerInclusive": false,
            "upperInclusive": true,
        }))
        .unwrap();
        assert_eq!(range.lower(), Bound::Excluded("b"));
        assert_eq!(range.upper(), Bound::Included("d"));
    }

    #[test]
    fn malformed_range_is_rejected() {
        let malformed = [
            json!(["b"]),
            json!({ "lower": "b" }),
            json!({ "lower": "b", "upper": "d", "gte": true }),
        ];
        for bad in &malformed {
            let err = parse_range(bad.clone()).unwrap_err();
            assert_eq!(err.kind(), StoreErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn request_names_match_the_wire() {
        let request =
            Request::from_json(r#"{"method":"getAllKeysWithPrefix","args":"ab"}"#).unwrap();
        assert_eq!(request, Request::GetAllKeysWithPrefix(json!("ab")));
        assert_eq!(request.method(), "getAllKeysWithPrefix");

        assert_eq!(Request::from_json(r#"{"method":"clear"}"#).unwrap(), Request::Clear);

        let err = Request::from_json(r#"{"method":"mergeItem","args":[]}"#).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::InvalidRequest);
    }

    #[test]
    fn reply_serializes_with_status_tag() {
        let keys: Result<Json> = Ok(json!(["a"]));
        let ok = Reply::from(keys);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "status": "success", "result": ["a"] })
        );

        let failed = Reply::from(StoreError::new(StoreErrorKind::InvalidKey, "empty"));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "status": "failure",
                "error": {
                    "category": "validation",
                    "code": "invalid_key",
                    "message": "Invalid key: empty"
                }
            })
        );
    }
}
