//! Scraper for the Bavarian Landtag (bayern.landtag.de).
//!
//! Listing pages are the Drucksachen search prefiltered to law-making
//! proceedings; items are `vorgangsanzeige` pages. Each item page carries
//! one table of dated process rows; every row is classified by its cell
//! text and folded into stations of the resulting Vorgang.
//!
//! HTML parsing happens in synchronous helpers over owned data: `Html`
//! documents never live across an await.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use collector_core::{
    CollectorCache, CollectorConfig, CollectorError, Document, DocumentContext, Fetcher,
    LlmConnector, Result, Scraper,
};
use ltzf_models::{
    Autor, Dokument, Doktyp, Gremium, Station, Stationstyp, Stellungnahme, VgIdent, VgIdentTyp,
    Vorgang, Vorgangstyp,
};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use uuid::Uuid;

const PARLAMENT: &str = "BY";
const WAHLPERIODE: u32 = 19;
const RESULT_COUNT: u32 = 200;
const BASE_URL: &str = "https://www.bayern.landtag.de";

pub struct ByltScraper {
    ctx: DocumentContext,
    trojan_threshold: u8,
    collector_id: Uuid,
    listing_urls: Vec<String>,
}

impl ByltScraper {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        llm: Arc<dyn LlmConnector>,
        cache: Arc<dyn CollectorCache>,
        config: CollectorConfig,
    ) -> Self {
        let listing_urls = vec![format!(
            "{BASE_URL}/parlament/dokumente/drucksachen?isInitialCheck=0&q=&dknr=\
             &suchverhalten=AND&dokumentenart=Drucksache&ist_basisdokument=on&sort=date\
             &anzahl_treffer={RESULT_COUNT}&wahlperiodeid%5B%5D={WAHLPERIODE}\
             &erfassungsdatum%5Bstart%5D=&erfassungsdatum%5Bend%5D=\
             &suchvorgangsarten%5B%5D=Gesetze%5C%5CGesetzentwurf\
             &suchvorgangsarten%5B%5D=Gesetze%5C%5CStaatsvertrag\
             &suchvorgangsarten%5B%5D=Gesetze%5C%5CHaushaltsgesetz%2C+Nachtragshaushaltsgesetz"
        )];
        Self {
            ctx: DocumentContext {
                fetcher,
                llm,
                cache,
                scratch_dir: config.scratch_dir.clone(),
            },
            trojan_threshold: config.trojan_threshold,
            collector_id: Uuid::new_v4(),
            listing_urls,
        }
    }

    async fn obtain_dokument(
        &self,
        url: &str,
        typ: Doktyp,
        drucksnr: Option<&str>,
    ) -> Result<Document> {
        let mut dok = Document::obtain(&self.ctx, &absolutize(url), typ).await?;
        if let Some(nr) = drucksnr {
            dok.set_drucksnr(nr);
        }
        Ok(dok)
    }

    async fn build_vorgang(&self, item_url: &str, page: ItemPage) -> Result<Vorgang> {
        let mut vg = Vorgang {
            api_id: Uuid::new_v4(),
            titel: page.titel.clone(),
            kurztitel: Some(page.titel),
            wahlperiode: WAHLPERIODE,
            verfassungsaendernd: false,
            trojaner: false,
            typ: Vorgangstyp::GgLandParl,
            initiatoren: page.initiatoren,
            ids: vec![VgIdent { typ: VgIdentTyp::Initdrucks, id: page.initiativ_drucksnr.clone() }],
            links: vec![item_url.to_string()],
            stationen: vec![],
        };

        for row in page.rows {
            match row.class {
                CellClass::Initiativ => {
                    let link = single_link(&row, item_url)?;
                    vg.links.push(absolutize(&link));
                    let dok = self
                        .obtain_dokument(&link, Doktyp::Entwurf, Some(&page.initiativ_drucksnr))
                        .await?;
                    vg.stationen.push(Station {
                        typ: Stationstyp::ParlInitiativ,
                        zp_start: row.zp_start,
                        gremium: Some(plenum()),
                        trojanergefahr: dok.trojanergefahr().max(1),
                        betroffene_texte: dok.betroffene_texte().to_vec(),
                        dokumente: vec![dok.package()],
                        stellungnahmen: vec![],
                        link: Some(item_url.to_string()),
                    });
                }
                CellClass::Stellungnahme => {
                    let (link, autor) = schrstellung_link(&row, item_url)?;
                    let mut dok =
                        self.obtain_dokument(&link, Doktyp::Stellungnahme, None).await?;
                    if let Some(org) = autor {
                        dok.add_autor(Autor::organisation(org));
                    }
                    let meinung = dok.meinung().unwrap_or(0);
                    let Some(last) = vg.stationen.last_mut() else {
                        return Err(CollectorError::Extraction {
                            url: item_url.to_string(),
                            reason: "Stellungnahme without preceding station".to_string(),
                        });
                    };
                    last.stellungnahmen.push(Stellungnahme { dokument: dok.package(), meinung });
                }
                CellClass::PlenumProto(typ) => {
                    let link = protokollauszug_link(&row, item_url)?;
                    let dok = self.obtain_dokument(&link, Doktyp::Protokoll, None).await?;
                    if let Some(video) = row.link_labelled("Video zum TOP") {
                        vg.links.push(absolutize(&video));
                    }
                    self.push_or_merge(&mut vg, typ, plenum(), dok, row.zp_start, item_url, 0);
                }
                CellClass::Rueckzug => {
                    let link = single_link(&row, item_url)?;
                    let drucksnr = extract_drucksnr(&row.text);
                    let dok = self
                        .obtain_dokument(&link, Doktyp::Mitteilung, drucksnr.as_deref())
                        .await?;
                    self.push_or_merge(
                        &mut vg,
                        Stationstyp::ParlZurueckgezogen,
                        plenum(),
                        dok,
                        row.zp_start,
                        item_url,
                        0,
                    );
                }
                CellClass::PlenumBeschluss(typ) => {
                    let link = single_link(&row, item_url)?;
                    let drucksnr = extract_drucksnr(&row.text);
                    let dok = self
                        .obtain_dokument(&link, Doktyp::Entwurf, drucksnr.as_deref())
                        .await?;
                    let gefahr = dok.trojanergefahr().max(1);
                    self.push_or_merge(&mut vg, typ, plenum(), dok, row.zp_start, item_url, gefahr);
                }
                CellClass::AusschussBse => {
                    let link = single_link(&row, item_url)?;
                    let drucksnr = extract_drucksnr(&row.text);
                    let dok = self
                        .obtain_dokument(&link, Doktyp::Beschlussempfehlung, drucksnr.as_deref())
                        .await?;
                    let Some(name) = row.lines.get(1).cloned() else {
                        return Err(CollectorError::Extraction {
                            url: item_url.to_string(),
                            reason: "committee row without committee name".to_string(),
                        });
                    };
                    let candidate = Station {
                        typ: Stationstyp::ParlAusschber,
                        zp_start: row.zp_start,
                        gremium: Some(Gremium {
                            name: name.clone(),
                            parlament: PARLAMENT.to_string(),
                            wahlperiode: WAHLPERIODE,
                        }),
                        dokumente: vec![dok.package()],
                        stellungnahmen: vec![],
                        trojanergefahr: dok.trojanergefahr().max(1),
                        betroffene_texte: vec![],
                        link: Some(item_url.to_string()),
                    };

                    // Consecutive reports of the same committee fold into one
                    // station; a plenary station closes the merge window.
                    if let Some(existing) = find_open_committee_station(&mut vg.stationen, &name) {
                        debug!(committee = %name, "merging committee report");
                        existing.merge(candidate);
                        dedup_by_drucksnr(&mut existing.dokumente);
                    } else {
                        vg.stationen.push(candidate);
                    }
                }
                CellClass::Gsblatt => {
                    let link = single_link(&row, item_url)?;
                    let dok = self.obtain_dokument(&link, Doktyp::Sonstig, None).await?;
                    vg.stationen.push(Station {
                        typ: Stationstyp::PostparlGsblt,
                        zp_start: row.zp_start,
                        gremium: Some(Gremium {
                            name: "gesetzesblatt".to_string(),
                            parlament: PARLAMENT.to_string(),
                            wahlperiode: WAHLPERIODE,
                        }),
                        dokumente: vec![dok.package()],
                        stellungnahmen: vec![],
                        trojanergefahr: 0,
                        betroffene_texte: vec![],
                        link: Some(item_url.to_string()),
                    });
                }
                CellClass::Unknown => {
                    warn!(item = %item_url, cell = %row.text, "unknown process row, skipped");
                }
            }
        }

        // A proceeding without a single resolved stage must not reach
        // submission; the table may hold nothing but pending rows.
        if vg.stationen.is_empty() {
            return Err(CollectorError::Extraction {
                url: item_url.to_string(),
                reason: "no station could be extracted".to_string(),
            });
        }

        vg.trojaner = vg.max_trojanergefahr() >= self.trojan_threshold;
        vg.sort_stationen();
        Ok(vg)
    }

    /// Append a document to the trailing station when it has the same
    /// stage type, otherwise open a new station.
    #[allow(clippy::too_many_arguments)]
    fn push_or_merge(
        &self,
        vg: &mut Vorgang,
        typ: Stationstyp,
        gremium: Gremium,
        dok: Document,
        zp_start: DateTime<Utc>,
        item_url: &str,
        trojanergefahr: u8,
    ) {
        let candidate = Station {
            typ,
            zp_start,
            gremium: Some(gremium),
            dokumente: vec![dok.package()],
            stellungnahmen: vec![],
            trojanergefahr,
            betroffene_texte: vec![],
            link: Some(item_url.to_string()),
        };
        if let Some(last) = vg.stationen.last_mut() {
            if last.typ == typ {
                // Later rows carry the fresher gremium label.
                last.gremium = candidate.gremium.clone();
                last.merge(candidate);
                dedup_by_drucksnr(&mut last.dokumente);
                return;
            }
        }
        vg.stationen.push(candidate);
    }
}

#[async_trait::async_trait]
impl Scraper for ByltScraper {
    fn name(&self) -> &'static str {
        "bylt"
    }

    fn collector_id(&self) -> Uuid {
        self.collector_id
    }

    fn listing_urls(&self) -> &[String] {
        &self.listing_urls
    }

    async fn listing_page_extractor(&self, url: &str) -> Result<Vec<String>> {
        debug!(url = %url, "extracting listing page");
        let body = self.ctx.fetcher.fetch(url).await?;
        let urls = parse_listing(&body.text());
        if urls.is_empty() {
            return Err(CollectorError::Extraction {
                url: url.to_string(),
                reason: "no entries on listing page".to_string(),
            });
        }
        Ok(urls)
    }

    async fn item_extractor(&self, item: &str) -> Result<Vorgang> {
        let body = self.ctx.fetcher.fetch(item).await?;
        let page = parse_item_page(item, &body.text())?;
        self.build_vorgang(item, page).await
    }
}

fn plenum() -> Gremium {
    Gremium {
        name: "plenum".to_string(),
        parlament: PARLAMENT.to_string(),
        wahlperiode: WAHLPERIODE,
    }
}

fn absolutize(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{BASE_URL}{href}")
    } else {
        format!("{BASE_URL}/{href}")
    }
}

/// Classification of one process-table cell, by its visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellClass {
    Initiativ,
    Stellungnahme,
    AusschussBse,
    PlenumProto(Stationstyp),
    PlenumBeschluss(Stationstyp),
    Rueckzug,
    Gsblatt,
    Unknown,
}

fn classify_cell(text: &str) -> CellClass {
    if text.contains("Initiativdrucksache") {
        CellClass::Initiativ
    } else if text.contains("Schriftliche Stellungnahmen im Gesetzgebungsverfahren") {
        CellClass::Stellungnahme
    } else if text.contains("Plenum") {
        if text.contains("Plenarprotokoll") {
            if text.contains("Überweisung") {
                CellClass::PlenumProto(Stationstyp::ParlVollvlsgn)
            } else if text.contains("Zustimmung") {
                CellClass::PlenumProto(Stationstyp::ParlAkzeptanz)
            } else if text.contains("Ablehnung") {
                CellClass::PlenumProto(Stationstyp::ParlAblehnung)
            } else if text.contains("Rücknahme") {
                CellClass::PlenumProto(Stationstyp::ParlZurueckgezogen)
            } else {
                CellClass::Unknown
            }
        } else if text.contains("Ablehnung") {
            CellClass::PlenumBeschluss(Stationstyp::ParlAblehnung)
        } else if text.contains("Zustimmung") {
            CellClass::PlenumBeschluss(Stationstyp::ParlAkzeptanz)
        } else if text.contains("Rücknahme") {
            CellClass::Rueckzug
        } else {
            CellClass::Unknown
        }
    } else if text.contains("Ausschuss") {
        CellClass::AusschussBse
    } else if text.contains("Gesetz- und Verordnungsblatt") {
        CellClass::Gsblatt
    } else {
        CellClass::Unknown
    }
}

#[derive(Debug, Clone)]
struct PageLink {
    label: String,
    href: String,
}

#[derive(Debug, Clone)]
struct StationRow {
    zp_start: DateTime<Utc>,
    class: CellClass,
    /// Full cell text, lines joined with spaces
    text: String,
    /// Non-empty text lines of the cell, in document order
    lines: Vec<String>,
    links: Vec<PageLink>,
}

impl StationRow {
    fn link_labelled(&self, label: &str) -> Option<String> {
        self.links.iter().find(|l| l.label == label).map(|l| l.href.clone())
    }
}

#[derive(Debug)]
struct ItemPage {
    titel: String,
    initiativ_drucksnr: String,
    initiatoren: Vec<Autor>,
    rows: Vec<StationRow>,
}

fn selector(css: &str) -> Selector {
    // All selectors in this module are literals, checked by the tests.
    Selector::parse(css).unwrap_or_else(|_| unreachable!("invalid selector: {css}"))
}

fn parse_listing(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let result_div = selector("div.row.result");
    let link = selector("a.link-with-icon");

    let mut urls = Vec::new();
    for div in document.select(&result_div) {
        for a in div.select(&link) {
            if let Some(href) = a.value().attr("href") {
                if href.contains("views/vorgangsanzeige") {
                    urls.push(href.trim().to_string());
                }
            }
        }
    }
    urls
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_lines(el: ElementRef<'_>) -> Vec<String> {
    el.text()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_error(url: &str, reason: impl Into<String>) -> CollectorError {
    CollectorError::Extraction { url: url.to_string(), reason: reason.into() }
}

fn parse_item_page(url: &str, html: &str) -> Result<ItemPage> {
    let document = Html::parse_document(html);

    let titel = document
        .select(&selector("span#betreff"))
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| parse_error(url, "missing Betreff"))?;

    // "... Nr. 19/123 vom ..." names the initiating Drucksache.
    let basistext = document
        .select(&selector("span#basistext"))
        .next()
        .map(element_text)
        .ok_or_else(|| parse_error(url, "missing Basistext"))?;
    let initiativ_drucksnr = basistext
        .split("Nr. ")
        .nth(1)
        .and_then(|rest| rest.split(" vom").next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| parse_error(url, "Basistext without Drucksache number"))?
        .to_string();

    let initiatoren = parse_initiatoren(&document);
    if initiatoren.is_empty() {
        return Err(parse_error(url, "no Initiatoren found"));
    }

    let mut rows = Vec::new();
    let td = selector("td");
    for row in document.select(&selector("tbody#vorgangsanzeigedokumente_data tr")) {
        let cells: Vec<ElementRef<'_>> = row.select(&td).collect();
        if cells.len() != 2 {
            return Err(parse_error(url, format!("expected 2 cells, got {}", cells.len())));
        }
        let date_text = element_text(cells[0]);
        // Rows without a result yet carry no date and no content.
        if date_text == "Beratung / Ergebnis folgt" {
            continue;
        }
        let zp_start = parse_row_date(&date_text)
            .ok_or_else(|| parse_error(url, format!("unexpected date format `{date_text}`")))?;

        let lines = text_lines(cells[1]);
        let text = lines.join(" ");
        let links = cells[1]
            .select(&selector("a"))
            .filter_map(|a| {
                a.value().attr("href").map(|href| PageLink {
                    label: element_text(a),
                    href: href.trim().to_string(),
                })
            })
            .collect();

        rows.push(StationRow { zp_start, class: classify_cell(&text), text, lines, links });
    }

    Ok(ItemPage { titel, initiativ_drucksnr, initiatoren, rows })
}

/// The initiator list sits in the first `ul` following the element whose
/// text is exactly "Initiatoren".
fn parse_initiatoren(document: &Html) -> Vec<Autor> {
    let li = selector("li");
    let mut initiatoren = Vec::new();
    for el in document.select(&selector("*")) {
        if el.text().collect::<String>().trim() != "Initiatoren" {
            continue;
        }
        let Some(list) = el
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sib| sib.value().name() == "ul")
        else {
            continue;
        };
        for item in list.select(&li) {
            let text = element_text(item);
            if text.is_empty() {
                continue;
            }
            initiatoren.push(parse_initiator(&text));
        }
        break;
    }
    initiatoren
}

/// "Dr. Jane Doe (FRAKTION)" carries a person; a bare name is an
/// organisation.
fn parse_initiator(text: &str) -> Autor {
    match text.rsplit_once('(') {
        Some((person, org)) => {
            Autor::person(person.trim(), org.trim_end_matches(')').trim())
        }
        None => Autor::organisation(text.trim()),
    }
}

/// Dates in the process table are `DD.MM.YYYY`.
fn parse_row_date(text: &str) -> Option<DateTime<Utc>> {
    let mut parts = text.trim().splitn(3, '.');
    let day: u32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn drucksnr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{2,}/\d+").unwrap_or_else(|_| unreachable!()))
}

fn extract_drucksnr(text: &str) -> Option<String> {
    let found = text
        .split_whitespace()
        .find_map(|token| drucksnr_regex().find(token))
        .map(|m| m.as_str().to_string());
    if found.is_none() {
        warn!(cell = %text, "no Drucksache number in cell");
    }
    found
}

fn single_link(row: &StationRow, item_url: &str) -> Result<String> {
    row.links
        .first()
        .map(|l| l.href.clone())
        .ok_or_else(|| parse_error(item_url, format!("cell without link: {}", row.text)))
}

/// A written-opinion cell carries either just the PDF link or a
/// lobby-register link (labelled with the author) followed by the PDF.
fn schrstellung_link(row: &StationRow, item_url: &str) -> Result<(String, Option<String>)> {
    match row.links.as_slice() {
        [pdf] => {
            let autor = Some(pdf.label.clone()).filter(|l| l != "Download PDF" && !l.is_empty());
            Ok((pdf.href.clone(), autor))
        }
        [register, pdf] => {
            let autor =
                Some(register.label.clone()).filter(|l| l != "Download PDF" && !l.is_empty());
            Ok((pdf.href.clone(), autor))
        }
        other => Err(parse_error(
            item_url,
            format!("expected 1 or 2 links in Stellungnahme cell, got {}", other.len()),
        )),
    }
}

/// A plenary-protocol cell links the full protocol, the excerpt
/// ("Protokollauszug", listed last), and sometimes a video.
fn protokollauszug_link(row: &StationRow, item_url: &str) -> Result<String> {
    row.links
        .iter()
        .filter(|l| l.label != "Video zum TOP")
        .last()
        .map(|l| l.href.clone())
        .ok_or_else(|| parse_error(item_url, format!("protocol cell without link: {}", row.text)))
}

fn dedup_by_drucksnr(dokumente: &mut Vec<Dokument>) {
    let mut seen: Vec<String> = Vec::new();
    dokumente.retain(|d| match &d.drucksnr {
        Some(nr) => {
            if seen.contains(nr) {
                false
            } else {
                seen.push(nr.clone());
                true
            }
        }
        None => true,
    });
}

/// Walk backwards from the newest station looking for a committee station
/// with the given name; stop at the first plenary station.
fn find_open_committee_station<'a>(
    stationen: &'a mut [Station],
    committee: &str,
) -> Option<&'a mut Station> {
    let mut index = None;
    for (i, station) in stationen.iter().enumerate().rev() {
        if station.typ.is_plenary() {
            break;
        }
        if station.typ == Stationstyp::ParlAusschber
            && station.gremium.as_ref().is_some_and(|g| g.name == committee)
        {
            index = Some(i);
            break;
        }
    }
    index.map(|i| &mut stationen[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use collector_core::testing::{minimal_pdf, ScriptedLlm, StaticFetcher};
    use collector_core::MemoryCache;
    use std::time::Duration;

    const LISTING_HTML: &str = r#"
        <html><body>
        <div class="row result">
          <div>
            <h5>Gesetzentwurf</h5>
            <a class="link-with-icon" href="https://www.bayern.landtag.de/webangebot3/views/vorgangsanzeige/vorgangsanzeige.xhtml?gegenstandid=157296">Vorgang</a>
            <a class="link-with-icon" href="/dokumente/irrelevant.pdf">PDF</a>
          </div>
        </div>
        <div class="row result">
          <div>
            <a class="link-with-icon" href="https://www.bayern.landtag.de/webangebot3/views/vorgangsanzeige/vorgangsanzeige.xhtml?gegenstandid=157725">Vorgang</a>
          </div>
        </div>
        </body></html>
    "#;

    fn item_html() -> String {
        r#"
        <html><body>
        <span id="betreff">Gesetz zur Änderung
            des Testgesetzes</span>
        <span id="basistext">Initiativdrucksache Nr. 19/123 vom 01.02.2024</span>
        <h5>Initiatoren</h5>
        <ul>
          <li>Staatsregierung</li>
          <li>Dr. Jane Doe (FRAKTION)</li>
        </ul>
        <table><tbody id="vorgangsanzeigedokumente_data">
          <tr>
            <td>01.02.2024</td>
            <td>Initiativdrucksache
                <a href="https://www.bayern.landtag.de/doks/entwurf.pdf">Download PDF</a></td>
          </tr>
          <tr>
            <td>05.02.2024</td>
            <td>Schriftliche Stellungnahmen im Gesetzgebungsverfahren
                <a href="https://www.bayern.landtag.de/doks/stellung.pdf">Verband XY</a></td>
          </tr>
          <tr>
            <td>Beratung / Ergebnis folgt</td>
            <td></td>
          </tr>
        </tbody></table>
        </body></html>
        "#
        .to_string()
    }

    fn entwurf_response() -> String {
        serde_json::json!({
            "titel": "Gesetz zur Änderung des Testgesetzes",
            "autoren": [],
            "schlagworte": ["test"],
            "trojanergefahr": 2,
            "betroffene_texte": ["Testgesetz"],
            "zusammenfassung": "Ändert das Testgesetz."
        })
        .to_string()
    }

    fn stellungnahme_response() -> String {
        serde_json::json!({
            "titel": "Stellungnahme zum Testgesetz",
            "autoren": [],
            "schlagworte": [],
            "meinung": -1,
            "zusammenfassung": "Kritisch."
        })
        .to_string()
    }

    fn scraper_with(fetcher: StaticFetcher, llm: ScriptedLlm) -> ByltScraper {
        ByltScraper::new(
            Arc::new(fetcher),
            Arc::new(llm),
            Arc::new(MemoryCache::new(Duration::from_secs(60))),
            CollectorConfig::default(),
        )
    }

    #[test]
    fn listing_page_yields_vorgangsanzeige_urls() {
        let urls = parse_listing(LISTING_HTML);
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| u.contains("views/vorgangsanzeige")));
    }

    #[test]
    fn cell_classification_matches_site_vocabulary() {
        assert_eq!(classify_cell("Initiativdrucksache 19/123"), CellClass::Initiativ);
        assert_eq!(
            classify_cell("Schriftliche Stellungnahmen im Gesetzgebungsverfahren"),
            CellClass::Stellungnahme
        );
        assert_eq!(
            classify_cell("Plenum Plenarprotokoll Überweisung"),
            CellClass::PlenumProto(Stationstyp::ParlVollvlsgn)
        );
        assert_eq!(
            classify_cell("Plenum Plenarprotokoll Zustimmung"),
            CellClass::PlenumProto(Stationstyp::ParlAkzeptanz)
        );
        assert_eq!(
            classify_cell("Plenum Zustimmung Drucksache 19/999"),
            CellClass::PlenumBeschluss(Stationstyp::ParlAkzeptanz)
        );
        assert_eq!(classify_cell("Plenum Rücknahme"), CellClass::Rueckzug);
        assert_eq!(classify_cell("Ausschuss für Verfassung"), CellClass::AusschussBse);
        assert_eq!(classify_cell("Gesetz- und Verordnungsblatt Nr. 5"), CellClass::Gsblatt);
        assert_eq!(classify_cell("völlig anderes"), CellClass::Unknown);
    }

    #[test]
    fn item_page_parses_header_and_rows() {
        let page = parse_item_page("test://item", &item_html()).unwrap();
        assert_eq!(page.titel, "Gesetz zur Änderung des Testgesetzes");
        assert_eq!(page.initiativ_drucksnr, "19/123");
        assert_eq!(
            page.initiatoren,
            vec![
                Autor::organisation("Staatsregierung"),
                Autor::person("Dr. Jane Doe", "FRAKTION"),
            ]
        );
        // The pending row carries no date and is dropped.
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].class, CellClass::Initiativ);
        assert_eq!(page.rows[1].class, CellClass::Stellungnahme);
        assert_eq!(
            page.rows[0].zp_start,
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn drucksnr_is_found_in_cell_text() {
        assert_eq!(extract_drucksnr("Drucksache 19/1234 vom"), Some("19/1234".to_string()));
        assert_eq!(extract_drucksnr("kein Treffer"), None);
    }

    #[test]
    fn committee_merge_window_closes_at_plenary_stations() {
        fn station(typ: Stationstyp, name: &str) -> Station {
            Station {
                typ,
                zp_start: Utc::now(),
                gremium: Some(Gremium {
                    name: name.to_string(),
                    parlament: "BY".into(),
                    wahlperiode: 19,
                }),
                dokumente: vec![],
                stellungnahmen: vec![],
                trojanergefahr: 0,
                betroffene_texte: vec![],
                link: None,
            }
        }

        let mut open = vec![
            station(Stationstyp::ParlInitiativ, "plenum"),
            station(Stationstyp::ParlAusschber, "Verfassungsausschuss"),
        ];
        assert!(find_open_committee_station(&mut open, "Verfassungsausschuss").is_some());
        assert!(find_open_committee_station(&mut open, "Haushaltsausschuss").is_none());

        let mut closed = vec![
            station(Stationstyp::ParlAusschber, "Verfassungsausschuss"),
            station(Stationstyp::ParlVollvlsgn, "plenum"),
        ];
        assert!(find_open_committee_station(&mut closed, "Verfassungsausschuss").is_none());
    }

    #[tokio::test]
    async fn item_extractor_builds_a_full_vorgang() {
        let item_url = "https://www.bayern.landtag.de/webangebot3/views/vorgangsanzeige/vorgangsanzeige.xhtml?gegenstandid=1";
        let fetcher = StaticFetcher::new()
            .with_body(item_url, item_html().into_bytes())
            .with_body(
                "https://www.bayern.landtag.de/doks/entwurf.pdf",
                minimal_pdf("Der Landtag wolle beschließen"),
            )
            .with_body(
                "https://www.bayern.landtag.de/doks/stellung.pdf",
                minimal_pdf("Wir lehnen den Entwurf ab"),
            );
        let llm = ScriptedLlm::new()
            .with_response(entwurf_response())
            .with_response(stellungnahme_response());
        let scraper = scraper_with(fetcher, llm);

        let vg = scraper.item_extractor(item_url).await.unwrap();
        assert_eq!(vg.titel, "Gesetz zur Änderung des Testgesetzes");
        assert_eq!(vg.typ, Vorgangstyp::GgLandParl);
        assert_eq!(vg.ids, vec![VgIdent { typ: VgIdentTyp::Initdrucks, id: "19/123".into() }]);
        assert_eq!(vg.initiatoren.len(), 2);

        assert_eq!(vg.stationen.len(), 1);
        let station = &vg.stationen[0];
        assert_eq!(station.typ, Stationstyp::ParlInitiativ);
        assert_eq!(station.dokumente.len(), 1);
        assert_eq!(station.dokumente[0].drucksnr.as_deref(), Some("19/123"));
        assert_eq!(station.betroffene_texte, vec!["Testgesetz".to_string()]);
        // An initiating draft always carries at least minimal risk.
        assert_eq!(station.trojanergefahr, 2);

        assert_eq!(station.stellungnahmen.len(), 1);
        let stellungnahme = &station.stellungnahmen[0];
        assert_eq!(stellungnahme.meinung, -1);
        assert!(stellungnahme
            .dokument
            .autoren
            .contains(&Autor::organisation("Verband XY")));

        // gefahr 2 stays below the default threshold of 5
        assert!(!vg.trojaner);
    }

    #[tokio::test]
    async fn item_with_only_pending_rows_is_an_error() {
        // The site shows proceedings whose table holds nothing but rows
        // still awaiting deliberation. Such an item must not produce a
        // submittable Vorgang without any station.
        let item_url = "https://www.bayern.landtag.de/webangebot3/views/vorgangsanzeige/vorgangsanzeige.xhtml?gegenstandid=2";
        let html = r#"
        <html><body>
        <span id="betreff">Gesetz ohne Beratungsstand</span>
        <span id="basistext">Initiativdrucksache Nr. 19/456 vom 01.03.2024</span>
        <h5>Initiatoren</h5>
        <ul><li>Staatsregierung</li></ul>
        <table><tbody id="vorgangsanzeigedokumente_data">
          <tr><td>Beratung / Ergebnis folgt</td><td></td></tr>
          <tr>
            <td>12.03.2024</td>
            <td>völlig unbekannter Eintrag</td>
          </tr>
        </tbody></table>
        </body></html>
        "#;
        let fetcher = StaticFetcher::new().with_body(item_url, html.as_bytes().to_vec());
        let scraper = scraper_with(fetcher, ScriptedLlm::new());

        let err = scraper.item_extractor(item_url).await.unwrap_err();
        assert!(matches!(err, CollectorError::Extraction { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn consecutive_protocol_rows_fold_into_one_station() {
        let item_url = "https://www.bayern.landtag.de/webangebot3/views/vorgangsanzeige/vorgangsanzeige.xhtml?gegenstandid=3";
        let html = r#"
        <html><body>
        <span id="betreff">Gesetz mit zwei Lesungen</span>
        <span id="basistext">Initiativdrucksache Nr. 19/321 vom 01.02.2024</span>
        <h5>Initiatoren</h5>
        <ul><li>Staatsregierung</li></ul>
        <table><tbody id="vorgangsanzeigedokumente_data">
          <tr>
            <td>01.02.2024</td>
            <td>Initiativdrucksache
                <a href="https://www.bayern.landtag.de/doks/entwurf321.pdf">Download PDF</a></td>
          </tr>
          <tr>
            <td>10.03.2024</td>
            <td>Plenum Plenarprotokoll Überweisung
                <a href="https://www.bayern.landtag.de/doks/proto1.pdf">Protokollauszug</a></td>
          </tr>
          <tr>
            <td>15.03.2024</td>
            <td>Plenum Plenarprotokoll Überweisung
                <a href="https://www.bayern.landtag.de/doks/proto2.pdf">Protokollauszug</a></td>
          </tr>
        </tbody></table>
        </body></html>
        "#;
        let fetcher = StaticFetcher::new()
            .with_body(item_url, html.as_bytes().to_vec())
            .with_body(
                "https://www.bayern.landtag.de/doks/entwurf321.pdf",
                minimal_pdf("Der Landtag wolle beschließen"),
            )
            .with_body(
                "https://www.bayern.landtag.de/doks/proto1.pdf",
                minimal_pdf("Protokoll der ersten Lesung"),
            )
            .with_body(
                "https://www.bayern.landtag.de/doks/proto2.pdf",
                minimal_pdf("Fortsetzung der ersten Lesung"),
            );
        let llm = ScriptedLlm::new().with_response(entwurf_response());
        let scraper = scraper_with(fetcher, llm);

        let vg = scraper.item_extractor(item_url).await.unwrap();
        assert_eq!(vg.stationen.len(), 2);

        let proto = &vg.stationen[1];
        assert_eq!(proto.typ, Stationstyp::ParlVollvlsgn);
        // Both excerpts land on the folded station, earliest date wins.
        assert_eq!(proto.dokumente.len(), 2);
        assert_eq!(proto.zp_start, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(proto.gremium.as_ref().map(|g| g.name.as_str()), Some("plenum"));
    }

    #[tokio::test]
    async fn empty_listing_page_is_an_error() {
        let fetcher =
            StaticFetcher::new().with_body("test://listing", b"<html><body></body></html>".to_vec());
        let scraper = scraper_with(fetcher, ScriptedLlm::new());
        assert!(scraper.listing_page_extractor("test://listing").await.is_err());
    }
}
