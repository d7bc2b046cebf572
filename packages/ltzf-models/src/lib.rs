//! Wire-format records for the LTZF database API.
//!
//! These are the structures a collector submits downstream, one
//! [`Vorgang`] per processed legislative proceeding. They carry no
//! behavior beyond serialization and a few ordering/merge helpers;
//! everything here must round-trip through JSON unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a legislative proceeding.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vorgangstyp {
    /// Federal law not requiring Bundesrat assent
    #[serde(rename = "gg-einspruch")]
    GgEinspruch,
    /// Federal law requiring Bundesrat assent
    #[serde(rename = "gg-zustimmung")]
    GgZustimmung,
    /// State law via parliament
    #[serde(rename = "gg-land-parl")]
    GgLandParl,
    /// State law via popular initiative
    #[serde(rename = "gg-land-volk")]
    GgLandVolk,
    #[serde(rename = "sonstig")]
    Sonstig,
}

/// Stage type of a [`Station`] within a proceeding.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stationstyp {
    /// Introduction of the draft into parliament
    #[serde(rename = "parl-initiativ")]
    ParlInitiativ,
    /// Committee deliberation / report
    #[serde(rename = "parl-ausschber")]
    ParlAusschber,
    /// Full plenary deliberation
    #[serde(rename = "parl-vollvlsgn")]
    ParlVollvlsgn,
    /// Accepted in a plenary vote
    #[serde(rename = "parl-akzeptanz")]
    ParlAkzeptanz,
    /// Rejected in a plenary vote
    #[serde(rename = "parl-ablehnung")]
    ParlAblehnung,
    /// Withdrawn by the initiators
    #[serde(rename = "parl-zurueckgezogen")]
    ParlZurueckgezogen,
    /// Published in the law gazette
    #[serde(rename = "postparl-gsblt")]
    PostparlGsblt,
    /// Entered into force
    #[serde(rename = "postparl-kraft")]
    PostparlKraft,
    #[serde(rename = "sonstig")]
    Sonstig,
}

impl Stationstyp {
    /// Plenary stages close the committee-merge window during parsing.
    pub fn is_plenary(self) -> bool {
        matches!(
            self,
            Stationstyp::ParlInitiativ
                | Stationstyp::ParlVollvlsgn
                | Stationstyp::ParlAkzeptanz
                | Stationstyp::ParlAblehnung
        )
    }
}

/// Type hint of a [`Dokument`], chosen by the scraper before download.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Doktyp {
    /// Draft law text
    Entwurf,
    /// Committee recommendation
    Beschlussempfehlung,
    /// Third-party opinion
    Stellungnahme,
    /// Plenary transcript
    Protokoll,
    /// Administrative notice
    Mitteilung,
    Sonstig,
}

impl Doktyp {
    /// Placeholder title used when semantic extraction is skipped or fails.
    pub fn default_titel(self) -> &'static str {
        match self {
            Doktyp::Entwurf => "Gesetzesentwurf",
            Doktyp::Beschlussempfehlung => "Beschlussempfehlung",
            Doktyp::Stellungnahme => "Stellungnahme",
            Doktyp::Protokoll => "Protokoll",
            Doktyp::Mitteilung => "Mitteilung",
            Doktyp::Sonstig => "Sonstiges",
        }
    }
}

/// Typed external identifier of a proceeding.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VgIdentTyp {
    /// Number of the initiating parliamentary document
    #[serde(rename = "initdrucks")]
    Initdrucks,
    /// Parliament-internal proceeding number
    #[serde(rename = "vorgnr")]
    Vorgnr,
    #[serde(rename = "sonstig")]
    Sonstig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct VgIdent {
    pub typ: VgIdentTyp,
    pub id: String,
}

/// An initiating or authoring party: an organisation, optionally with a
/// named person affiliated with it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Autor {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub person: Option<String>,
    pub organisation: String,
}

impl Autor {
    pub fn organisation(organisation: impl Into<String>) -> Self {
        Self { person: None, organisation: organisation.into() }
    }

    pub fn person(person: impl Into<String>, organisation: impl Into<String>) -> Self {
        Self { person: Some(person.into()), organisation: organisation.into() }
    }
}

/// Sponsoring body of a [`Station`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gremium {
    pub name: String,
    pub parlament: String,
    pub wahlperiode: u32,
}

/// Semantically enriched projection of one fetched artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dokument {
    pub titel: String,
    pub link: String,
    /// sha256 over the raw bytes, hex-encoded
    pub hash: String,
    pub typ: Doktyp,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub zp_erstellt: Option<DateTime<Utc>>,
    pub zp_modifiziert: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub drucksnr: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub autoren: Vec<Autor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub schlagworte: Vec<String>,
    /// Hidden-agenda risk heuristic, 0..=10
    #[serde(default)]
    pub trojanergefahr: u8,
    /// Stance of an opinion document, -1..=1; None for other types
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub meinung: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub zusammenfassung: Option<String>,
}

/// An opinion attached to a station: the underlying document plus its
/// stance score.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stellungnahme {
    pub dokument: Dokument,
    pub meinung: i8,
}

/// One timestamped stage of a proceeding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Station {
    pub typ: Stationstyp,
    pub zp_start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub gremium: Option<Gremium>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub dokumente: Vec<Dokument>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub stellungnahmen: Vec<Stellungnahme>,
    #[serde(default)]
    pub trojanergefahr: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub betroffene_texte: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub link: Option<String>,
}

impl Station {
    /// Fold another station of the same stage into this one: union of
    /// documents and opinions, earliest start time, highest risk score.
    pub fn merge(&mut self, other: Station) {
        debug_assert_eq!(self.typ, other.typ);
        if other.zp_start < self.zp_start {
            self.zp_start = other.zp_start;
        }
        for dok in other.dokumente {
            if !self.dokumente.iter().any(|d| d.link == dok.link) {
                self.dokumente.push(dok);
            }
        }
        for stl in other.stellungnahmen {
            if !self.stellungnahmen.iter().any(|s| s.dokument.link == stl.dokument.link) {
                self.stellungnahmen.push(stl);
            }
        }
        self.trojanergefahr = self.trojanergefahr.max(other.trojanergefahr);
        for text in other.betroffene_texte {
            if !self.betroffene_texte.contains(&text) {
                self.betroffene_texte.push(text);
            }
        }
    }
}

/// A legislative proceeding, the top-level record produced per item.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vorgang {
    pub api_id: Uuid,
    pub titel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub kurztitel: Option<String>,
    pub wahlperiode: u32,
    pub verfassungsaendernd: bool,
    /// Set when any station carries a risk score above the configured
    /// threshold.
    pub trojaner: bool,
    pub typ: Vorgangstyp,
    pub initiatoren: Vec<Autor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub ids: Vec<VgIdent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub links: Vec<String>,
    pub stationen: Vec<Station>,
}

impl Vorgang {
    /// Stations are logically ordered by start time, not discovery order.
    pub fn sort_stationen(&mut self) {
        self.stationen.sort_by_key(|s| s.zp_start);
    }

    /// Highest risk score across all stations.
    pub fn max_trojanergefahr(&self) -> u8 {
        self.stationen.iter().map(|s| s.trojanergefahr).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dok(link: &str) -> Dokument {
        Dokument {
            titel: "Testdokument".into(),
            link: link.into(),
            hash: "ab".repeat(32),
            typ: Doktyp::Entwurf,
            zp_erstellt: None,
            zp_modifiziert: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            drucksnr: None,
            autoren: vec![],
            schlagworte: vec![],
            trojanergefahr: 0,
            meinung: None,
            zusammenfassung: None,
        }
    }

    #[test]
    fn vorgang_roundtrips_through_json() {
        let vg = Vorgang {
            api_id: Uuid::new_v4(),
            titel: "Gesetz zur Änderung des Testgesetzes".into(),
            kurztitel: None,
            wahlperiode: 19,
            verfassungsaendernd: false,
            trojaner: false,
            typ: Vorgangstyp::GgLandParl,
            initiatoren: vec![Autor::organisation("Staatsregierung")],
            ids: vec![VgIdent { typ: VgIdentTyp::Initdrucks, id: "19/123".into() }],
            links: vec!["https://example.org/vorgang/1".into()],
            stationen: vec![Station {
                typ: Stationstyp::ParlInitiativ,
                zp_start: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
                gremium: None,
                dokumente: vec![dok("https://example.org/d1.pdf")],
                stellungnahmen: vec![],
                trojanergefahr: 2,
                betroffene_texte: vec![],
                link: None,
            }],
        };
        let json = serde_json::to_string(&vg).unwrap();
        let back: Vorgang = serde_json::from_str(&json).unwrap();
        assert_eq!(vg, back);
    }

    #[test]
    fn wire_names_are_kebab_case() {
        assert_eq!(serde_json::to_string(&Vorgangstyp::GgLandParl).unwrap(), "\"gg-land-parl\"");
        assert_eq!(serde_json::to_string(&Stationstyp::ParlAusschber).unwrap(), "\"parl-ausschber\"");
        assert_eq!(serde_json::to_string(&Doktyp::Entwurf).unwrap(), "\"entwurf\"");
    }

    #[test]
    fn station_merge_unions_documents_and_keeps_earliest_start() {
        let mut a = Station {
            typ: Stationstyp::ParlAusschber,
            zp_start: Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap(),
            gremium: Some(Gremium {
                name: "Ausschuss für Verfassung".into(),
                parlament: "BY".into(),
                wahlperiode: 19,
            }),
            dokumente: vec![dok("https://example.org/a.pdf")],
            stellungnahmen: vec![],
            trojanergefahr: 1,
            betroffene_texte: vec!["BayVwVfG".into()],
            link: None,
        };
        let mut b = a.clone();
        b.zp_start = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        b.dokumente = vec![dok("https://example.org/a.pdf"), dok("https://example.org/b.pdf")];
        b.trojanergefahr = 4;
        b.betroffene_texte = vec!["BayVwVfG".into(), "BayBG".into()];

        a.merge(b);
        assert_eq!(a.dokumente.len(), 2);
        assert_eq!(a.zp_start, Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
        assert_eq!(a.trojanergefahr, 4);
        assert_eq!(a.betroffene_texte, vec!["BayVwVfG".to_string(), "BayBG".to_string()]);
    }

    #[test]
    fn sort_stationen_orders_by_start_time() {
        let s1 = Station {
            typ: Stationstyp::ParlAkzeptanz,
            zp_start: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
            gremium: None,
            dokumente: vec![],
            stellungnahmen: vec![],
            trojanergefahr: 0,
            betroffene_texte: vec![],
            link: None,
        };
        let mut s0 = s1.clone();
        s0.typ = Stationstyp::ParlInitiativ;
        s0.zp_start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let mut vg = Vorgang {
            api_id: Uuid::new_v4(),
            titel: "t".into(),
            kurztitel: None,
            wahlperiode: 19,
            verfassungsaendernd: false,
            trojaner: false,
            typ: Vorgangstyp::Sonstig,
            initiatoren: vec![Autor::organisation("o")],
            ids: vec![],
            links: vec![],
            stationen: vec![s1, s0],
        };
        vg.sort_stationen();
        assert_eq!(vg.stationen[0].typ, Stationstyp::ParlInitiativ);
    }
}
