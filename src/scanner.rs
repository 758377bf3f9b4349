//! Interactive-element scanner (§4.1). Turns the visible DOM into a list
//! of addressable [`Region`]s keyed by a fresh identity attribute written
//! onto the element itself — never a positional index, which is the
//! source of the historical phantom-click bug (see `rationale` below).
#![allow(dead_code)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{SoulBrowserError, SoulResult};
use crate::toolkit::Toolkit;

/// The custom attribute the scanner writes onto each addressable element.
/// Region identities are queried back via `[data-soulbrowser-id="..."]` —
/// an attribute selector the browser itself resolves, immune to DOM
/// reordering.
pub const IDENTITY_ATTR: &str = "data-soulbrowser-id";

const MIN_REGIONS_BEFORE_CURSOR_FALLBACK: usize = 5;
const MIN_DIMENSION_PX: f64 = 5.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Link,
    Button,
    Input,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Other,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    fn is_rendered(&self) -> bool {
        self.width >= MIN_DIMENSION_PX && self.height >= MIN_DIMENSION_PX
    }
}

/// An addressable interactive element found on the page. Lives for at
/// most one scan cycle (I1): the identity attribute is the only way to
/// address the element later.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub label: String,
    pub role: Role,
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(default)]
    pub href: Option<String>,
}

/// Raw shape returned by [`SCAN_SCRIPT`] before identity assignment; the
/// script already assigns the identity attribute itself and reports it
/// back so the host process never has to guess which node it targeted.
#[derive(Debug, Deserialize)]
struct RawRegion {
    id: String,
    label: String,
    role: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    href: Option<String>,
    #[serde(default)]
    fallback: bool,
}

/// JS evaluated in the page's main execution context. Clears any residual
/// identity attributes from a previous scan, walks candidate interactive
/// elements in document order, bubbles up to an enclosing `<a>`/`<button>`
/// for icon-only controls, derives a label, deduplicates by href, and
/// writes a fresh 8-hex identity attribute onto the chosen target.
///
/// Returns `{ regions: RawRegion[], fallbackUsed: bool }` as JSON.
pub const SCAN_SCRIPT: &str = r#"(function() {
  const ATTR = "data-soulbrowser-id";
  document.querySelectorAll("[" + ATTR + "]").forEach((el) => {
    try { el.removeAttribute(ATTR); } catch (e) {}
  });

  function rid() {
    return "element-" + Math.floor(Math.random() * 0xffffffff).toString(16).padStart(8, "0").slice(0, 8);
  }

  function visible(el) {
    const r = el.getBoundingClientRect();
    if (r.width < 5 || r.height < 5) return null;
    const style = window.getComputedStyle(el);
    if (style.visibility === "hidden" || style.display === "none" || style.opacity === "0") return null;
    return r;
  }

  function bubbleUp(el) {
    const tag = el.tagName.toLowerCase();
    if (!["img", "div", "span", "svg"].includes(tag)) return el;
    let cur = el;
    for (let i = 0; i < 3 && cur.parentElement; i++) {
      cur = cur.parentElement;
      const t = cur.tagName.toLowerCase();
      if (t === "a" || t === "button") return cur;
    }
    return el;
  }

  function label(el) {
    const aria = el.getAttribute("aria-label");
    if (aria && aria.trim()) return aria.trim();
    const name = el.getAttribute("name");
    if (name && name.trim()) return name.trim();
    const ph = el.getAttribute("placeholder");
    if (ph && ph.trim()) return ph.trim();
    const text = (el.textContent || "").trim();
    if (text) return text;
    const img = el.querySelector("img");
    if (img) {
      const alt = img.getAttribute("alt");
      return alt && alt.trim() ? "Image: " + alt.trim() : "Unlabeled Image";
    }
    return "";
  }

  function role(el) {
    const ariaRole = el.getAttribute("role");
    if (ariaRole) {
      const r = ariaRole.toLowerCase();
      if (["link", "button", "checkbox", "radio"].includes(r)) return r;
    }
    const tag = el.tagName.toLowerCase();
    if (tag === "a") return "link";
    if (tag === "button") return "button";
    if (tag === "textarea") return "textarea";
    if (tag === "select") return "select";
    if (tag === "input") {
      const t = (el.getAttribute("type") || "text").toLowerCase();
      if (t === "checkbox") return "checkbox";
      if (t === "radio") return "radio";
      return "input";
    }
    return "other";
  }

  const selector = "button, [role=button], a[href], input:not([type=hidden]), textarea, select, [role=link], [role=checkbox], [role=radio]";
  const seenHref = new Set();
  const regions = [];
  const candidates = Array.from(document.querySelectorAll(selector));

  for (const raw of candidates) {
    const target = bubbleUp(raw);
    const rect = visible(target);
    if (!rect) continue;

    const lbl = label(target).replace(/\s+/g, " ").trim().slice(0, 100);
    if (!lbl) continue;

    const href = target.tagName.toLowerCase() === "a" ? target.getAttribute("href") : null;
    if (href) {
      if (seenHref.has(href)) continue;
      seenHref.add(href);
    }

    const id = rid();
    target.setAttribute(ATTR, id);
    regions.push({
      id, label: lbl, role: role(target),
      x: rect.x, y: rect.y, width: rect.width, height: rect.height,
      href: href || undefined, fallback: false,
    });
  }

  let fallbackUsed = false;
  if (regions.length < 5) {
    fallbackUsed = true;
    const all = document.querySelectorAll("*:not([" + ATTR + "])");
    for (const el of all) {
      if (el.hasAttribute(ATTR)) continue;
      const style = window.getComputedStyle(el);
      if (style.cursor !== "pointer") continue;
      const rect = visible(el);
      if (!rect) continue;
      const lbl = label(el).replace(/\s+/g, " ").trim().slice(0, 100);
      if (!lbl) continue;
      const id = rid();
      el.setAttribute(ATTR, id);
      regions.push({
        id, label: lbl, role: role(el),
        x: rect.x, y: rect.y, width: rect.width, height: rect.height,
        href: undefined, fallback: true,
      });
    }
  }

  return JSON.stringify({ regions, fallbackUsed });
})()"#;

pub struct Scanner<'a> {
    toolkit: &'a Toolkit,
}

impl<'a> Scanner<'a> {
    pub fn new(toolkit: &'a Toolkit) -> Self {
        Self { toolkit }
    }

    /// `scan(quick?) → [Region]`. `quick` disables the SPA retry (used for
    /// screenshot-only rescans right after ACT, to avoid compounding
    /// delays, §4.1).
    pub async fn scan(&self, quick: bool) -> SoulResult<Vec<Region>> {
        let regions = self.scan_once().await?;
        if !regions.is_empty() || quick {
            return Ok(regions);
        }

        let url = self.toolkit.current_url().await;
        if url.is_empty() || url == "about:blank" {
            return Ok(regions);
        }

        self.toolkit
            .wait_network_idle(Duration::from_secs(5))
            .await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        self.scan_once().await
    }

    async fn scan_once(&self) -> SoulResult<Vec<Region>> {
        let value = self
            .toolkit
            .evaluate(SCAN_SCRIPT)
            .await
            .map_err(|e| SoulBrowserError::transient_toolkit(e.to_string()))?;

        let raw = value
            .as_str()
            .ok_or_else(|| SoulBrowserError::internal("scan script returned non-string result"))?;
        let parsed: ScanResult = serde_json::from_str(raw)?;

        Ok(parsed
            .regions
            .into_iter()
            .filter_map(|r| raw_region_to_region(r))
            .collect())
    }

    /// Resolves a region identity to a CSS attribute selector for the
    /// toolkit's click/fill operations — a query, never a stored pointer.
    pub fn selector_for(id: &str) -> String {
        format!("[{IDENTITY_ATTR}=\"{id}\"]")
    }
}

#[derive(Debug, Deserialize)]
struct ScanResult {
    regions: Vec<RawRegion>,
    #[serde(rename = "fallbackUsed", default)]
    #[allow(dead_code)]
    fallback_used: bool,
}

fn raw_region_to_region(raw: RawRegion) -> Option<Region> {
    let bbox = BoundingBox {
        x: raw.x,
        y: raw.y,
        width: raw.width,
        height: raw.height,
    };
    if !bbox.is_rendered() {
        return None;
    }
    let role = match raw.role.as_str() {
        "link" => Role::Link,
        "button" => Role::Button,
        "input" => Role::Input,
        "textarea" => Role::Textarea,
        "select" => Role::Select,
        "checkbox" => Role::Checkbox,
        "radio" => Role::Radio,
        _ => Role::Other,
    };
    Some(Region {
        id: raw.id,
        label: raw.label,
        role,
        bbox,
        confidence: if raw.fallback { 0.7 } else { 1.0 },
        href: raw.href,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_for_uses_identity_attribute() {
        assert_eq!(
            Scanner::selector_for("element-abc12345"),
            "[data-soulbrowser-id=\"element-abc12345\"]"
        );
    }

    #[test]
    fn raw_region_rejects_zero_size() {
        let raw = RawRegion {
            id: "element-00000000".into(),
            label: "tiny".into(),
            role: "button".into(),
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            href: None,
            fallback: false,
        };
        assert!(raw_region_to_region(raw).is_none());
    }

    #[test]
    fn fallback_region_gets_lower_confidence() {
        let raw = RawRegion {
            id: "element-11111111".into(),
            label: "cursor pointer div".into(),
            role: "other".into(),
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 20.0,
            href: None,
            fallback: true,
        };
        let region = raw_region_to_region(raw).expect("region retained");
        assert!((region.confidence - 0.7).abs() < f32::EPSILON);
    }
}
