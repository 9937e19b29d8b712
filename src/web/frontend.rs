//! Embedded HTML/CSS/JS frontend for the obrcast dashboard.
//!
//! The entire SPA is compiled into the binary as a string constant.
//! No external assets, no build tools, no CDN dependencies. Configurable
//! values (rate bounds, poll interval) are injected at serve time.

use crate::config::schema::RatesConfig;

/// Render the dashboard page with the configured rate bounds and poll
/// interval substituted into the embedded template.
pub fn render(rates: &RatesConfig, poll_interval_secs: u64) -> String {
    INDEX_HTML
        .replace("__RATE_MIN_PCT__", &format!("{}", rates.min * 100.0))
        .replace("__RATE_MAX_PCT__", &format!("{}", rates.max * 100.0))
        .replace("__RATE_STEP_PCT__", &format!("{}", rates.step * 100.0))
        .replace("__POLL_MS__", &format!("{}", poll_interval_secs * 1000))
}

/// The complete single-page dashboard HTML template.
const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>obrcast — OBR Forecast Impact Estimator</title>
<style>
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --accent: #58a6ff;
  --green: #3fb950;
  --yellow: #d29922;
  --red: #f85149;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
  --mono: 'SF Mono', 'Cascadia Code', 'Fira Code', monospace;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  background: var(--bg);
  color: var(--text);
  font-family: var(--font);
  font-size: 14px;
  line-height: 1.5;
}

.app { max-width: 1100px; margin: 0 auto; padding: 24px; }

header {
  display: flex;
  align-items: baseline;
  justify-content: space-between;
  margin-bottom: 24px;
  padding-bottom: 16px;
  border-bottom: 1px solid var(--border);
}
header h1 { font-size: 22px; font-weight: 600; }
header h1 .logo { color: var(--accent); font-family: var(--mono); }
header .subtitle { color: var(--text-muted); font-size: 13px; }

.card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 20px;
  margin-bottom: 20px;
}
.card h2 { font-size: 15px; font-weight: 600; margin-bottom: 12px; }
.card .desc { color: var(--text-muted); font-size: 13px; margin-bottom: 12px; }

label { display: block; font-size: 13px; color: var(--text-muted); margin-bottom: 4px; }
select, input[type=number] {
  background: var(--bg);
  color: var(--text);
  border: 1px solid var(--border);
  border-radius: 6px;
  padding: 6px 8px;
  font-size: 13px;
  font-family: var(--mono);
}
select { min-width: 280px; }
input[type=number] { width: 82px; }

.row { display: flex; gap: 16px; align-items: end; flex-wrap: wrap; }
.toggle { display: flex; align-items: center; gap: 6px; color: var(--text-muted); font-size: 13px; }

table.rates { border-collapse: collapse; width: 100%; margin-top: 8px; }
table.rates th, table.rates td {
  border-bottom: 1px solid var(--border);
  padding: 6px 8px;
  text-align: right;
  font-size: 13px;
}
table.rates th:first-child, table.rates td:first-child { text-align: left; }

button.primary {
  background: var(--accent);
  color: #06172b;
  border: none;
  border-radius: 6px;
  padding: 10px 20px;
  font-size: 14px;
  font-weight: 600;
  cursor: pointer;
  margin-top: 16px;
}
button.primary:disabled { opacity: 0.5; cursor: not-allowed; }

.banner {
  border-radius: 6px;
  padding: 10px 14px;
  margin-bottom: 16px;
  font-size: 13px;
  display: none;
}
.banner.error { display: block; background: rgba(248,81,73,0.12); border: 1px solid var(--red); color: var(--red); }
.banner.info { display: block; background: rgba(88,166,255,0.10); border: 1px solid var(--accent); color: var(--accent); }

.status { color: var(--text-muted); font-size: 13px; margin-top: 12px; }
.spinner {
  display: inline-block;
  width: 12px; height: 12px;
  border: 2px solid var(--border);
  border-top-color: var(--accent);
  border-radius: 50%;
  margin-right: 6px;
  vertical-align: -2px;
  animation: spin 0.9s linear infinite;
}
@keyframes spin { to { transform: rotate(360deg); } }

.charts { display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }
.charts .wide { grid-column: 1 / -1; }
svg text { fill: var(--text-muted); font-size: 11px; font-family: var(--mono); }
svg .axis { stroke: var(--border); stroke-width: 1; }
.footer { color: var(--text-muted); font-size: 12px; text-align: right; margin-top: 8px; }
</style>
</head>
<body>
<div class="app">
  <header>
    <h1><span class="logo">obrcast</span> OBR Forecast Impact Estimator</h1>
    <span class="subtitle">PolicyEngine microsimulation</span>
  </header>

  <div id="banner" class="banner"></div>

  <div class="card">
    <h2>Configure Forecast Parameters</h2>
    <div class="row">
      <div>
        <label for="forecast">Forecast</label>
        <select id="forecast"></select>
      </div>
      <div class="toggle">
        <input type="checkbox" id="custom">
        <label for="custom" style="margin:0">Custom scenario (edit growth rates)</label>
      </div>
    </div>

    <div id="rates-section" style="display:none">
      <p class="desc" style="margin-top:16px">
        Adjust the growth factors for each year to simulate different economic
        scenarios. Values are percentages.
      </p>
      <table class="rates" id="rates-table"></table>
    </div>

    <button class="primary" id="analyze" disabled>Analyze Forecast Impact</button>
    <div class="status" id="status"></div>
  </div>

  <div class="charts" id="results" style="display:none">
    <div class="card">
      <h2>Median Household Income</h2>
      <p class="desc">Annual household income after taxes and benefits</p>
      <div id="chart-income"></div>
    </div>
    <div class="card">
      <h2>Poverty Rate</h2>
      <p class="desc">Share of population below the poverty line</p>
      <div id="chart-poverty"></div>
    </div>
    <div class="card wide">
      <h2>Income Growth by Decile</h2>
      <p class="desc">Year-over-year change in aggregate household income by income decile</p>
      <div id="chart-deciles"></div>
      <div class="footer">Data calculated using PolicyEngine</div>
    </div>
  </div>
</div>

<script>
"use strict";

const RATE_MIN = __RATE_MIN_PCT__;   // percent
const RATE_MAX = __RATE_MAX_PCT__;   // percent
const RATE_STEP = __RATE_STEP_PCT__; // percent
const POLL_MS = __POLL_MS__;

const CATEGORIES = [
  ["earned_income", "Earned Income Growth"],
  ["mixed_income", "Mixed Income Growth"],
  ["capital_income", "Capital Income Growth"],
  ["inflation", "Inflation Rate"],
];

const state = {
  years: [],
  rates: null,        // decimal matrix, mirrors the wire shape
  computationId: null,
  pollTimer: null,    // single active poller; cleared on every exit path
};

const $ = (id) => document.getElementById(id);

function showBanner(kind, text) {
  const el = $("banner");
  el.className = "banner " + kind;
  el.textContent = text;
}
function hideBanner() { $("banner").className = "banner"; }

function setStatus(html) { $("status").innerHTML = html; }

// -- Metadata load ----------------------------------------------------------

async function loadMetadata() {
  try {
    const resp = await fetch("/api/forecasts");
    if (!resp.ok) throw new Error("HTTP " + resp.status);
    const data = await resp.json();

    const select = $("forecast");
    select.innerHTML = "";
    for (const f of data.forecasts || []) {
      const opt = document.createElement("option");
      opt.value = f.id;
      opt.textContent = f.name + " (" + f.date + ")";
      select.appendChild(opt);
    }
    // First forecast is the default selection
    if (select.options.length > 0) select.selectedIndex = 0;

    state.years = data.forecast_years || [];
    state.rates = data.default_growth_rates ||
      { earned_income: {}, mixed_income: {}, capital_income: {}, inflation: {} };
    buildRatesTable();

    $("analyze").disabled = select.options.length === 0;
  } catch (err) {
    // Feature remains partially usable with empty lists; no retry.
    showBanner("error", "Error fetching forecasts: " + err.message);
  }
}

function buildRatesTable() {
  const table = $("rates-table");
  table.innerHTML = "";

  const head = document.createElement("tr");
  head.innerHTML = "<th>Growth Factor</th>" +
    state.years.map((y) => "<th>" + y + "</th>").join("");
  table.appendChild(head);

  for (const [key, label] of CATEGORIES) {
    const row = document.createElement("tr");
    const cells = ["<td>" + label + "</td>"];
    for (const year of state.years) {
      const decimal = (state.rates[key] || {})[year] || 0;
      cells.push(
        '<td><input type="number" data-cat="' + key + '" data-year="' + year +
        '" value="' + (decimal * 100).toFixed(1) +
        '" min="' + RATE_MIN + '" max="' + RATE_MAX + '" step="' + RATE_STEP + '"></td>'
      );
    }
    row.innerHTML = cells.join("");
    table.appendChild(row);
  }

  // Every edit updates the matrix immediately — no debouncing
  table.querySelectorAll("input").forEach((input) => {
    input.addEventListener("input", () => {
      const pct = parseFloat(input.value);
      if (Number.isNaN(pct)) return;
      const clamped = Math.min(RATE_MAX, Math.max(RATE_MIN, pct));
      state.rates[input.dataset.cat][input.dataset.year] = clamped / 100;
    });
  });
}

// -- Submission and polling -------------------------------------------------

function clearPoll() {
  if (state.pollTimer !== null) {
    clearTimeout(state.pollTimer);
    state.pollTimer = null;
  }
  state.computationId = null;
}

// Polls are strictly sequential: the next one is scheduled only after the
// previous response has been handled.
function schedulePoll() {
  state.pollTimer = setTimeout(poll, POLL_MS);
}

async function postImpact(body) {
  const resp = await fetch("/api/impact", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(body),
  });
  const data = await resp.json();
  if (!resp.ok) throw new Error(data.error || ("HTTP " + resp.status));
  return data;
}

async function analyze() {
  const forecastId = $("forecast").value;
  if (!forecastId) return;

  // Starting a new analysis invalidates any prior computation
  clearPoll();
  hideBanner();
  $("results").style.display = "none";
  $("analyze").disabled = true;
  setStatus('<span class="spinner"></span>Running simulation with PolicyEngine… this may take a minute or two.');

  const custom = $("custom").checked;
  const body = { forecast_id: custom ? "custom" : forecastId };
  if (custom) body.growth_rates = state.rates;

  try {
    const data = await postImpact(body);
    handleImpactResponse(data);
  } catch (err) {
    fail("Error analyzing forecast: " + err.message);
  }
}

function handleImpactResponse(data) {
  if (data.median_income_by_year) {
    // Inline result (cache hit)
    finish(data);
  } else if (data.computation_id) {
    state.computationId = data.computation_id;
    setStatus('<span class="spinner"></span>Computing on the server (checking every ' +
      (POLL_MS / 1000) + 's)…');
    schedulePoll();
  } else {
    fail("Unexpected response from the server");
  }
}

async function poll() {
  const id = state.computationId;
  if (id === null) { clearPoll(); return; }
  try {
    const data = await postImpact({ forecast_id: "computation_id:" + id });
    if (state.computationId !== id) return; // superseded while in flight
    if (data.status === "computing") { schedulePoll(); return; }
    clearPoll();
    if (data.status === "completed" && data.result) {
      finish(data.result);
    } else {
      fail(data.error || "Computation failed");
    }
  } catch (err) {
    if (state.computationId !== id) return;
    fail("Error polling computation: " + err.message);
  }
}

function finish(result) {
  clearPoll();
  setStatus("");
  $("analyze").disabled = false;
  renderResults(result);
}

function fail(message) {
  clearPoll();
  setStatus("");
  $("results").style.display = "none";
  $("analyze").disabled = false;
  showBanner("error", message);
}

// No poll may fire after the page goes away
window.addEventListener("beforeunload", clearPoll);

// -- Charts -----------------------------------------------------------------

const W = 460, H = 240, PAD = 44;

function scale(domainMin, domainMax, rangeMin, rangeMax) {
  const span = domainMax - domainMin || 1;
  return (v) => rangeMin + ((v - domainMin) / span) * (rangeMax - rangeMin);
}

function decileColor(decile) {
  const red = Math.round(decile / 10 * 255);
  const blue = Math.round((11 - decile) / 10 * 255);
  return "rgb(" + red + ", 50, " + blue + ")";
}

function lineChart(series, fmt, stroke) {
  if (!series.length) return "<p class='desc'>No data.</p>";
  const years = series.map((p) => p.year);
  const values = series.map((p) => p.value);
  const x = scale(Math.min(...years), Math.max(...years), PAD, W - 12);
  const lo = Math.min(...values), hi = Math.max(...values);
  const y = scale(lo, hi, H - PAD, 16);

  const path = series
    .map((p, i) => (i === 0 ? "M" : "L") + x(p.year).toFixed(1) + " " + y(p.value).toFixed(1))
    .join(" ");
  const dots = series.map((p) =>
    '<circle cx="' + x(p.year).toFixed(1) + '" cy="' + y(p.value).toFixed(1) +
    '" r="3" fill="' + stroke + '"><title>' + p.year + ": " + fmt(p.value) + "</title></circle>"
  ).join("");
  const xLabels = years.map((yr) =>
    '<text x="' + x(yr).toFixed(1) + '" y="' + (H - PAD + 16) + '" text-anchor="middle">' + yr + "</text>"
  ).join("");

  return '<svg viewBox="0 0 ' + W + " " + H + '" width="100%">' +
    '<line class="axis" x1="' + PAD + '" y1="' + (H - PAD) + '" x2="' + (W - 12) + '" y2="' + (H - PAD) + '"/>' +
    '<text x="' + (PAD - 6) + '" y="20" text-anchor="end">' + fmt(hi) + "</text>" +
    '<text x="' + (PAD - 6) + '" y="' + (H - PAD) + '" text-anchor="end">' + fmt(lo) + "</text>" +
    '<path d="' + path + '" fill="none" stroke="' + stroke + '" stroke-width="2"/>' +
    dots + xLabels + "</svg>";
}

function decileChart(changes) {
  if (!changes.length) return "<p class='desc'>No data.</p>";
  const years = [...new Set(changes.map((c) => c.year))].sort();
  const maxAbs = Math.max(...changes.map((c) => Math.abs(c.change)), 1e-9);
  const WD = 960, HD = 280, PADD = 44;
  const groupW = (WD - PADD - 12) / years.length;
  const barW = Math.min(10, (groupW - 18) / 10);
  const mid = HD / 2;
  const yScale = (mid - 28) / maxAbs;

  let bars = "";
  years.forEach((year, gi) => {
    for (let d = 1; d <= 10; d++) {
      const item = changes.find((c) => c.year === year && c.decile === d);
      const change = item ? item.change : 0;
      const h = Math.abs(change) * yScale;
      const xPos = PADD + gi * groupW + 9 + (d - 1) * barW;
      const yPos = change >= 0 ? mid - h : mid;
      bars += '<rect x="' + xPos.toFixed(1) + '" y="' + yPos.toFixed(1) +
        '" width="' + (barW - 1.5).toFixed(1) + '" height="' + Math.max(h, 0.5).toFixed(1) +
        '" fill="' + decileColor(d) + '"><title>' + year + " decile " + d + ": " +
        (change * 100).toFixed(1) + "%</title></rect>";
    }
    bars += '<text x="' + (PADD + gi * groupW + groupW / 2).toFixed(1) + '" y="' +
      (HD - 8) + '" text-anchor="middle">' + year + "</text>";
  });

  return '<svg viewBox="0 0 ' + WD + " " + HD + '" width="100%">' +
    '<line class="axis" x1="' + PADD + '" y1="' + mid + '" x2="' + (WD - 12) + '" y2="' + mid + '"/>' +
    '<text x="' + (PADD - 6) + '" y="24" text-anchor="end">+' + (maxAbs * 100).toFixed(1) + "%</text>" +
    '<text x="' + (PADD - 6) + '" y="' + (HD - 24) + '" text-anchor="end">-' + (maxAbs * 100).toFixed(1) + "%</text>" +
    bars + "</svg>";
}

const fmtGBP = (v) => "£" + Math.round(v).toLocaleString("en-GB");
const fmtPct = (v) => (v * 100).toFixed(1) + "%";

function renderResults(result) {
  $("chart-income").innerHTML =
    lineChart(result.median_income_by_year || [], fmtGBP, "#58a6ff");

  const poverty = (result.absolute_poverty_by_year && result.absolute_poverty_by_year.length)
    ? result.absolute_poverty_by_year
    : (result.poverty_rate_by_year || []);
  $("chart-poverty").innerHTML = lineChart(poverty, fmtPct, "#f85149");

  $("chart-deciles").innerHTML = decileChart(result.decile_yearly_changes || []);
  $("results").style.display = "grid";
}

// -- Wiring -----------------------------------------------------------------

$("custom").addEventListener("change", (e) => {
  $("rates-section").style.display = e.target.checked ? "block" : "none";
});
$("analyze").addEventListener("click", analyze);

loadMetadata();
</script>
</body>
</html>
"##;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
