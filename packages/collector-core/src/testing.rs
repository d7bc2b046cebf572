//! Testing utilities including fake collaborator implementations.
//!
//! Production code carries no testing-mode branches; tests inject these
//! fakes through the same seams the binary uses for the real clients.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use ltzf_models::Vorgang;
use uuid::Uuid;

use crate::api::DatabaseApi;
use crate::error::{ApiError, CollectorError, LlmError, Result};
use crate::llm::LlmConnector;
use crate::net::{FetchedBody, Fetcher};

/// A [`Fetcher`] serving canned bodies by URL.
///
/// Unknown URLs fail the same way a 404 would, so tests can exercise the
/// download failure path without a network.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: RwLock<HashMap<String, Vec<u8>>>,
    calls: Arc<AtomicUsize>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`.
    pub fn with_body(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.bodies.write().unwrap().insert(url.into(), bytes);
        self
    }

    /// Shared counter of fetch calls, for cache-hit assertions.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.bodies.read().unwrap().get(url) {
            Some(bytes) => Ok(FetchedBody { status: 200, bytes: bytes.clone() }),
            None => Err(CollectorError::Fetch {
                url: url.to_string(),
                reason: "no canned body".to_string(),
            }),
        }
    }
}

/// An [`LlmConnector`] replaying a fixed queue of responses.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(response.into());
        self
    }

    /// Shared counter of generate calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl LlmConnector for ScriptedLlm {
    async fn generate(&self, _instruction: &str, _text: &str) -> std::result::Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Provider("no scripted response left".to_string()))
    }
}

/// Canned outcome of a submission attempt.
#[derive(Debug, Clone)]
pub enum CannedApiOutcome {
    Ok,
    Auth,
    Conflict,
    Unprocessable(String),
}

impl CannedApiOutcome {
    fn into_result(self) -> std::result::Result<(), ApiError> {
        match self {
            CannedApiOutcome::Ok => Ok(()),
            CannedApiOutcome::Auth => Err(ApiError::Auth),
            CannedApiOutcome::Conflict => Err(ApiError::Conflict),
            CannedApiOutcome::Unprocessable(body) => Err(ApiError::Unprocessable { body }),
        }
    }
}

/// A [`DatabaseApi`] that records submissions and replays canned
/// outcomes, keyed by the record title for deterministic tests.
#[derive(Default)]
pub struct RecordingApi {
    outcomes_by_titel: RwLock<HashMap<String, CannedApiOutcome>>,
    default_outcome: RwLock<Option<CannedApiOutcome>>,
    accepted: RwLock<Vec<Vorgang>>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the outcome for records with the given title.
    pub fn with_outcome_for(self, titel: impl Into<String>, outcome: CannedApiOutcome) -> Self {
        self.outcomes_by_titel.write().unwrap().insert(titel.into(), outcome);
        self
    }

    /// Override the outcome for every submission.
    pub fn failing_with(self, outcome: CannedApiOutcome) -> Self {
        *self.default_outcome.write().unwrap() = Some(outcome);
        self
    }

    /// Records accepted upstream so far.
    pub fn accepted(&self) -> Vec<Vorgang> {
        self.accepted.read().unwrap().clone()
    }

    /// Total submission attempts, including rejected ones.
    pub fn attempt_counter(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

#[async_trait]
impl DatabaseApi for RecordingApi {
    async fn put_vorgang(
        &self,
        _collector_id: Uuid,
        vorgang: &Vorgang,
    ) -> std::result::Result<(), ApiError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes_by_titel
            .read()
            .unwrap()
            .get(&vorgang.titel)
            .cloned()
            .or_else(|| self.default_outcome.read().unwrap().clone())
            .unwrap_or(CannedApiOutcome::Ok);
        if matches!(outcome, CannedApiOutcome::Ok) {
            self.accepted.write().unwrap().push(vorgang.clone());
        }
        outcome.into_result()
    }
}

/// Build a minimal one-page PDF containing `text`, with info-dictionary
/// dates set, for driving the full document pipeline in tests.
pub fn minimal_pdf(text: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode test content stream"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "CreationDate" => Object::string_literal("D:20240101120000Z"),
        "ModDate" => Object::string_literal("D:20240102120000+01'00'"),
    });
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("serialize test PDF");
    buf
}
