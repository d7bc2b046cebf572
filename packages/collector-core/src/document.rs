//! The per-artifact Document pipeline.
//!
//! A [`Document`] walks the state machine
//! `new → downloaded → metadata-extracted → semantics-extracted` and is
//! immutable once `extraction_success` is set. The network and LLM seams
//! are injected so tests can drive the whole pipeline with fakes.
//!
//! Failure rules: transport failures at any stage abort the current
//! `run_extraction` call (returning `false`, never panicking); malformed
//! LLM output is absorbed locally into a type-specific default record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ltzf_models::{Autor, Dokument, Doktyp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::CollectorCache;
use crate::error::{CollectorError, Result};
use crate::llm::LlmConnector;
use crate::net::Fetcher;
use crate::pdf;

/// Character budget for routines that only need header-like information.
const HEADER_PREFIX_CHARS: usize = 4000;

/// Shared clients and paths a Document needs to run its pipeline.
#[derive(Clone)]
pub struct DocumentContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub llm: Arc<dyn LlmConnector>,
    pub cache: Arc<dyn CollectorCache>,
    pub scratch_dir: PathBuf,
}

/// Serializable projection of a Document, used as the cache payload and
/// for field-wise equality in tests.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DokumentSnapshot {
    pub url: String,
    pub typ: Doktyp,
    pub hash: Option<String>,
    pub full_text: Vec<String>,
    pub titel: Option<String>,
    pub zp_erstellt: Option<DateTime<Utc>>,
    pub zp_modifiziert: Option<DateTime<Utc>>,
    pub drucksnr: Option<String>,
    pub autoren: Vec<Autor>,
    pub schlagworte: Vec<String>,
    pub trojanergefahr: u8,
    pub meinung: Option<i8>,
    pub betroffene_texte: Vec<String>,
    pub zusammenfassung: Option<String>,
    pub download_success: bool,
    pub extraction_success: bool,
}

/// Transient on-disk artifact, removed on every exit path.
///
/// Owned exclusively by the Document between download and metadata
/// extraction; the drop guard guarantees the file never outlives it.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    async fn write(dir: &Path, bytes: &[u8]) -> std::io::Result<Self> {
        let path = dir.join(format!("{}.pdf", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove scratch file");
            }
        }
    }
}

/// One artifact (almost always a PDF) plus its derived semantic fields.
pub struct Document {
    url: String,
    typ: Doktyp,
    fetcher: Arc<dyn Fetcher>,
    llm: Arc<dyn LlmConnector>,
    scratch_dir: PathBuf,
    scratch: Option<ScratchFile>,

    hash: Option<String>,
    full_text: Vec<String>,
    titel: Option<String>,
    zp_erstellt: Option<DateTime<Utc>>,
    zp_modifiziert: Option<DateTime<Utc>>,
    drucksnr: Option<String>,
    autoren: Vec<Autor>,
    schlagworte: Vec<String>,
    trojanergefahr: u8,
    meinung: Option<i8>,
    betroffene_texte: Vec<String>,
    zusammenfassung: Option<String>,

    download_success: bool,
    extraction_success: bool,
}

impl Document {
    pub fn new(
        url: impl Into<String>,
        typ: Doktyp,
        fetcher: Arc<dyn Fetcher>,
        llm: Arc<dyn LlmConnector>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: url.into(),
            typ,
            fetcher,
            llm,
            scratch_dir: scratch_dir.into(),
            scratch: None,
            hash: None,
            full_text: Vec::new(),
            titel: None,
            zp_erstellt: None,
            zp_modifiziert: None,
            drucksnr: None,
            autoren: Vec::new(),
            schlagworte: Vec::new(),
            trojanergefahr: 0,
            meinung: None,
            betroffene_texte: Vec::new(),
            zusammenfassung: None,
            download_success: false,
            extraction_success: false,
        }
    }

    /// Materialize a Document from the dokument cache, consulting it by
    /// source URL first and running the full pipeline only on a miss.
    pub async fn obtain(ctx: &DocumentContext, url: &str, typ: Doktyp) -> Result<Document> {
        if let Some(snapshot) = ctx.cache.get_dokument(url).await {
            debug!(url = %url, "dokument cache hit");
            return Ok(Document::from_snapshot(
                snapshot,
                ctx.fetcher.clone(),
                ctx.llm.clone(),
                ctx.scratch_dir.clone(),
            ));
        }

        let mut document =
            Document::new(url, typ, ctx.fetcher.clone(), ctx.llm.clone(), ctx.scratch_dir.clone());
        if !document.run_extraction().await {
            return Err(CollectorError::Extraction {
                url: url.to_string(),
                reason: "document pipeline failed".to_string(),
            });
        }
        ctx.cache.store_dokument(url, &document.snapshot()).await;
        Ok(document)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn typ(&self) -> Doktyp {
        self.typ
    }

    pub fn meinung(&self) -> Option<i8> {
        self.meinung
    }

    pub fn trojanergefahr(&self) -> u8 {
        self.trojanergefahr
    }

    pub fn betroffene_texte(&self) -> &[String] {
        &self.betroffene_texte
    }

    pub fn zp_modifiziert(&self) -> Option<DateTime<Utc>> {
        self.zp_modifiziert
    }

    pub fn download_success(&self) -> bool {
        self.download_success
    }

    pub fn extraction_success(&self) -> bool {
        self.extraction_success
    }

    /// The parliamentary document number is site metadata, assigned by
    /// the scraper rather than derived from the artifact.
    pub fn set_drucksnr(&mut self, drucksnr: impl Into<String>) {
        self.drucksnr = Some(drucksnr.into());
    }

    /// Record an author the scraper learned from the surrounding page.
    pub fn add_autor(&mut self, autor: Autor) {
        if !self.autoren.contains(&autor) {
            self.autoren.push(autor);
        }
    }

    /// Run the full pipeline: download, metadata, semantics.
    ///
    /// Returns `false` instead of an error; any stage failure is logged
    /// and leaves the scratch file removed.
    pub async fn run_extraction(&mut self) -> bool {
        let outcome = self.run_stages().await;
        // A failed stage may have left the scratch file pending removal.
        self.scratch = None;
        match outcome {
            Ok(()) => {
                self.extraction_success = true;
                true
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "document extraction failed");
                false
            }
        }
    }

    async fn run_stages(&mut self) -> Result<()> {
        self.download().await?;
        self.extract_metadata().await?;
        self.extract_semantics().await
    }

    /// Fetch the artifact and spool it to a transient scratch file.
    async fn download(&mut self) -> Result<()> {
        let body = self.fetcher.fetch(&self.url).await?;
        let scratch = ScratchFile::write(&self.scratch_dir, &body.bytes).await?;
        debug!(url = %self.url, path = %scratch.path.display(), bytes = body.bytes.len(), "downloaded artifact");
        self.scratch = Some(scratch);
        self.download_success = true;
        Ok(())
    }

    /// Fingerprint the raw bytes and pull text plus timestamps out of the
    /// PDF. The scratch file is consumed here, success or failure.
    async fn extract_metadata(&mut self) -> Result<()> {
        let scratch = self.scratch.take().ok_or_else(|| CollectorError::Extraction {
            url: self.url.clone(),
            reason: "metadata extraction before download".to_string(),
        })?;

        let bytes = scratch.read().await?;
        self.hash = Some(hex::encode(Sha256::digest(&bytes)));

        let content = pdf::read_pdf(&self.url, &bytes)?;
        self.full_text = content.pages;
        self.zp_erstellt = content.created;
        self.zp_modifiziert = Some(content.modified.or(content.created).unwrap_or_else(Utc::now));
        Ok(())
    }

    /// Type-dependent semantic extraction against the LLM.
    ///
    /// Empty or blank text short-circuits to the type-default title with
    /// zero LLM calls. LLM transport failures propagate; schema failures
    /// never do.
    async fn extract_semantics(&mut self) -> Result<()> {
        let full_text = self.full_text.join(" ");
        if full_text.trim().is_empty() {
            self.titel = Some(self.typ.default_titel().to_string());
            return Ok(());
        }
        if full_text.len() <= 20 {
            warn!(url = %self.url, text = %full_text, "extremely short text, possibly a non-machine-readable document");
        }

        match self.typ {
            Doktyp::Entwurf => {
                let response = self.llm.generate(prompts::ENTWURF, &full_text).await?;
                self.apply_entwurf_response(&response);
            }
            Doktyp::Stellungnahme => {
                let response = self.llm.generate(prompts::STELLUNGNAHME, &full_text).await?;
                self.apply_stellungnahme_response(&response);
            }
            Doktyp::Beschlussempfehlung | Doktyp::Mitteilung => {
                let prefix: String = full_text.chars().take(HEADER_PREFIX_CHARS).collect();
                let response = self.llm.generate(prompts::KOPFDATEN, &prefix).await?;
                self.apply_kopfdaten_response(&response);
            }
            Doktyp::Protokoll | Doktyp::Sonstig => {
                self.titel = Some(self.typ.default_titel().to_string());
            }
        }
        Ok(())
    }

    fn apply_entwurf_response(&mut self, response: &str) {
        match parse_json_object::<EntwurfResponse>(response) {
            Ok(parsed) => {
                self.titel = non_blank(parsed.titel);
                self.autoren = parsed.autoren.into_iter().map(AutorResponse::into_autor).collect();
                self.schlagworte = dedup_schlagworte(parsed.schlagworte);
                self.trojanergefahr = parsed.trojanergefahr.clamp(0, 10) as u8;
                self.betroffene_texte = parsed.betroffene_texte;
                self.zusammenfassung = parsed.zusammenfassung.and_then(non_blank);
            }
            Err(e) => self.apply_fallback(e, response),
        }
    }

    fn apply_stellungnahme_response(&mut self, response: &str) {
        match parse_json_object::<StellungnahmeResponse>(response) {
            Ok(parsed) => {
                self.titel = non_blank(parsed.titel);
                self.autoren = parsed.autoren.into_iter().map(AutorResponse::into_autor).collect();
                self.schlagworte = dedup_schlagworte(parsed.schlagworte);
                self.meinung = Some(parsed.meinung.clamp(-1, 1) as i8);
                self.zusammenfassung = parsed.zusammenfassung.and_then(non_blank);
            }
            Err(e) => self.apply_fallback(e, response),
        }
    }

    fn apply_kopfdaten_response(&mut self, response: &str) {
        match parse_json_object::<KopfdatenResponse>(response) {
            Ok(parsed) => {
                self.titel = non_blank(parsed.titel);
                self.autoren = parsed.autoren.into_iter().map(AutorResponse::into_autor).collect();
                if let Some(datum) = parsed.datum.and_then(|d| d.parse::<DateTime<Utc>>().ok()) {
                    self.zp_erstellt = Some(datum);
                }
            }
            Err(e) => self.apply_fallback(e, response),
        }
    }

    /// Fixed default record for malformed LLM output. Never raises; the
    /// only casualty is the quality of this one Document.
    fn apply_fallback(&mut self, error: serde_json::Error, response: &str) {
        warn!(
            url = %self.url,
            typ = ?self.typ,
            error = %error,
            response = %response,
            "LLM response violated the declared schema, falling back to defaults"
        );
        self.titel = Some(self.typ.default_titel().to_string());
        self.autoren = Vec::new();
        self.schlagworte = Vec::new();
        self.trojanergefahr = 0;
        self.meinung = if self.typ == Doktyp::Stellungnahme { Some(0) } else { None };
        self.betroffene_texte = Vec::new();
        self.zusammenfassung = None;
    }

    /// Project into the wire-format record. Pure and idempotent; a
    /// Document referenced from several Stations packages identically
    /// each time.
    pub fn package(&self) -> Dokument {
        Dokument {
            titel: self
                .titel
                .clone()
                .unwrap_or_else(|| self.typ.default_titel().to_string()),
            link: self.url.clone(),
            hash: self.hash.clone().unwrap_or_default(),
            typ: self.typ,
            zp_erstellt: self.zp_erstellt,
            zp_modifiziert: self.zp_modifiziert.unwrap_or_else(Utc::now),
            drucksnr: self.drucksnr.clone(),
            autoren: self.autoren.clone(),
            schlagworte: self.schlagworte.clone(),
            trojanergefahr: self.trojanergefahr,
            meinung: self.meinung,
            zusammenfassung: self.zusammenfassung.clone(),
        }
    }

    /// Serializable projection for caching.
    pub fn snapshot(&self) -> DokumentSnapshot {
        DokumentSnapshot {
            url: self.url.clone(),
            typ: self.typ,
            hash: self.hash.clone(),
            full_text: self.full_text.clone(),
            titel: self.titel.clone(),
            zp_erstellt: self.zp_erstellt,
            zp_modifiziert: self.zp_modifiziert,
            drucksnr: self.drucksnr.clone(),
            autoren: self.autoren.clone(),
            schlagworte: self.schlagworte.clone(),
            trojanergefahr: self.trojanergefahr,
            meinung: self.meinung,
            betroffene_texte: self.betroffene_texte.clone(),
            zusammenfassung: self.zusammenfassung.clone(),
            download_success: self.download_success,
            extraction_success: self.extraction_success,
        }
    }

    /// Rebuild a Document from a cached snapshot.
    pub fn from_snapshot(
        snapshot: DokumentSnapshot,
        fetcher: Arc<dyn Fetcher>,
        llm: Arc<dyn LlmConnector>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: snapshot.url,
            typ: snapshot.typ,
            fetcher,
            llm,
            scratch_dir: scratch_dir.into(),
            scratch: None,
            hash: snapshot.hash,
            full_text: snapshot.full_text,
            titel: snapshot.titel,
            zp_erstellt: snapshot.zp_erstellt,
            zp_modifiziert: snapshot.zp_modifiziert,
            drucksnr: snapshot.drucksnr,
            autoren: snapshot.autoren,
            schlagworte: snapshot.schlagworte,
            trojanergefahr: snapshot.trojanergefahr,
            meinung: snapshot.meinung,
            betroffene_texte: snapshot.betroffene_texte,
            zusammenfassung: snapshot.zusammenfassung,
            download_success: snapshot.download_success,
            extraction_success: snapshot.extraction_success,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_full_text_for_test(&mut self, pages: Vec<String>) {
        self.full_text = pages;
    }

    #[cfg(test)]
    pub(crate) async fn extract_semantics_for_test(&mut self) -> Result<()> {
        self.extract_semantics().await
    }
}

/// The instruction blocks sent to the LLM. Each declares one strict JSON
/// object schema; the parser enforces it byte-exactly and anything else
/// falls back to the type default.
mod prompts {
    pub const ENTWURF: &str = "\
Extrahiere folgende Metadaten aus dem nachfolgenden Gesetzestext und antworte \
mit genau einem JSON-Objekt mit diesen Feldern:
{
  \"titel\": string,
  \"autoren\": [{\"person\": string oder null, \"organisation\": string}],
  \"schlagworte\": [string],
  \"trojanergefahr\": Zahl zwischen 0 und 10, die die Gefahr einschätzt, dass \
im Gesetzestext fachfremde Dinge untergeschoben wurden,
  \"betroffene_texte\": [string] (betroffene Gesetzestexte),
  \"zusammenfassung\": Kurzzusammenfassung der Intention, dem Fokus, \
betroffenen Gruppen und anderen wichtigen Informationen in 150-250 Worten
}
Antworte mit nichts anderem als dem JSON-Objekt. Weiche unter keinen \
Umständen vom Schema ab. Fehlende Informationen: null bzw. leere Liste.";

    pub const STELLUNGNAHME: &str = "\
Extrahiere folgende Metadaten aus der nachfolgenden Stellungnahme und \
antworte mit genau einem JSON-Objekt mit diesen Feldern:
{
  \"titel\": string,
  \"autoren\": [{\"person\": string oder null, \"organisation\": string}],
  \"schlagworte\": [string],
  \"meinung\": -1, 0 oder 1 (ablehnend, neutral, zustimmend),
  \"zusammenfassung\": Kurzzusammenfassung der Stellungnahme, der Meinung \
und Kritik sowie betroffener Gruppen in 150-250 Worten
}
Antworte mit nichts anderem als dem JSON-Objekt. Weiche unter keinen \
Umständen vom Schema ab. Fehlende Informationen: null bzw. leere Liste.";

    pub const KOPFDATEN: &str = "\
Extrahiere Titel, Datum und Autoren aus dem Kopf des nachfolgenden Dokuments \
und antworte mit genau einem JSON-Objekt mit diesen Feldern:
{
  \"titel\": string,
  \"datum\": string im ISO-8601-Format mit Zeitzone oder null,
  \"autoren\": [{\"person\": string oder null, \"organisation\": string}]
}
Antworte mit nichts anderem als dem JSON-Objekt. Weiche unter keinen \
Umständen vom Schema ab. Fehlende Informationen: null bzw. leere Liste.";
}

#[derive(Deserialize)]
struct AutorResponse {
    #[serde(default)]
    person: Option<String>,
    organisation: String,
}

impl AutorResponse {
    fn into_autor(self) -> Autor {
        Autor { person: self.person.and_then(non_blank), organisation: self.organisation }
    }
}

#[derive(Deserialize)]
struct EntwurfResponse {
    titel: String,
    #[serde(default)]
    autoren: Vec<AutorResponse>,
    #[serde(default)]
    schlagworte: Vec<String>,
    #[serde(default)]
    trojanergefahr: i64,
    #[serde(default)]
    betroffene_texte: Vec<String>,
    #[serde(default)]
    zusammenfassung: Option<String>,
}

#[derive(Deserialize)]
struct StellungnahmeResponse {
    titel: String,
    #[serde(default)]
    autoren: Vec<AutorResponse>,
    #[serde(default)]
    schlagworte: Vec<String>,
    #[serde(default)]
    meinung: i64,
    #[serde(default)]
    zusammenfassung: Option<String>,
}

#[derive(Deserialize)]
struct KopfdatenResponse {
    titel: String,
    #[serde(default)]
    datum: Option<String>,
    #[serde(default)]
    autoren: Vec<AutorResponse>,
}

/// Strict parse of one JSON object, tolerating only a fenced code block
/// around it (models add those despite instructions).
fn parse_json_object<T: serde::de::DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Deduplicate keywords case-insensitively, keeping first spelling and
/// dropping blanks.
fn dedup_schlagworte(raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for word in raw {
        let trimmed = word.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed);
        }
    }
    out
}
