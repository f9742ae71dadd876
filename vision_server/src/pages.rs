//! Markup of the two pages.
//!
//! The scripts only mirror server state: buttons follow the controls reported by
//! `/api/status/stream` and results are inserted as text.

pub const LIVE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Live classifier</title>
<style>
  body { font-family: sans-serif; max-width: 680px; margin: 1rem auto; padding: 0 1rem; }
  .status-indicator { padding: .5rem; border-radius: .3rem; }
  .status-indicator.loading { background: #fff3cd; }
  .status-indicator.ready { background: #d1e7dd; }
  .status-indicator.error { background: #f8d7da; }
  #preview { width: 100%; background: #000; min-height: 240px; }
  #loading { display: none; }
  .bar { background: #eee; height: 1rem; }
  #confidence { background: #0d6efd; height: 100%; width: 0%; }
  button.pulse { box-shadow: 0 0 0 .2rem #0d6efd55; }
</style>
</head>
<body>
<h3>Live classifier</h3>
<div id="status" class="status-indicator loading">Loading...</div>
<img id="preview" src="/stream" alt="camera preview">
<p>
  <button id="capture" disabled>Classify</button>
  <button id="switch-camera">Switch camera</button>
  <a href="/upload">Analyze a photo</a>
</p>
<div id="loading">Classifying...</div>
<p id="result"></p>
<div class="bar"><div id="confidence"></div></div>
<span id="confidence-text">0%</span>
<script>
const $ = (id) => document.getElementById(id);

let captureEnabled = false;

function showStatus(snapshot) {
  $("status").textContent = snapshot.status.message;
  $("status").className = `status-indicator ${snapshot.status.kind}`;
  captureEnabled = snapshot.controls.capture;
  $("capture").disabled = !snapshot.controls.capture;
  $("capture").classList.toggle("pulse", snapshot.controls.capture);
  $("switch-camera").disabled = !snapshot.controls.switch_camera;
}

async function post(path) {
  const resp = await fetch(path, { method: "POST" });
  const body = await resp.json();
  if (!resp.ok) { throw body; }
  return body;
}

async function cameraCall(path) {
  try {
    await post(path);
    $("preview").src = `/stream?t=${Date.now()}`;
  } catch (err) {
    alert(err.message || "Error accessing the camera.");
  }
}

async function classify() {
  if ($("capture").disabled) { return; }
  $("capture").disabled = true;
  $("loading").style.display = "flex";
  try {
    const view = await post("/api/capture");
    $("result").textContent = view.headline;
    $("confidence").style.width = view.confidence;
    $("confidence-text").textContent = view.confidence;
  } catch (err) {
    $("result").textContent = err.message || "Error processing the image";
    $("confidence").style.width = "0%";
    $("confidence-text").textContent = "0%";
  } finally {
    $("loading").style.display = "none";
    $("capture").disabled = !captureEnabled;
  }
}

$("capture").addEventListener("click", classify);
$("switch-camera").addEventListener("click", () => {
  if (navigator.vibrate) { navigator.vibrate(50); }
  cameraCall("/api/camera/switch");
});
window.addEventListener("pagehide", () => navigator.sendBeacon("/api/camera/stop"));
new EventSource("/api/status/stream").onmessage = (e) => showStatus(JSON.parse(e.data));
document.addEventListener("DOMContentLoaded", () => cameraCall("/api/camera/start"));
</script>
</body>
</html>
"#;

pub const UPLOAD_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Photo analysis</title>
<style>
  body { font-family: sans-serif; max-width: 680px; margin: 1rem auto; padding: 0 1rem; }
  .status-indicator { padding: .5rem; border-radius: .3rem; }
  .status-indicator.loading { background: #fff3cd; }
  .status-indicator.ready { background: #d1e7dd; }
  .status-indicator.error { background: #f8d7da; }
  img { max-width: 100%; }
  #results { display: none; }
</style>
</head>
<body>
<h3>Photo analysis</h3>
<div id="status" class="status-indicator loading">Loading...</div>
<p>
  <input id="file" type="file" accept="image/*">
  <button id="analyze" disabled>Analyze</button>
  <a href="/">Live camera</a>
</p>
<img id="preview" alt="">
<section id="results">
  <h4>Classification</h4>
  <ul id="classification"></ul>
  <h4>Objects</h4>
  <ul id="detection"></ul>
  <img id="annotated" alt="detections">
</section>
<script>
const $ = (id) => document.getElementById(id);
let modelReady = false;
let previewUrl = null;

function updateAnalyze() {
  $("analyze").disabled = !(modelReady && $("file").files.length > 0);
}

function showStatus(snapshot) {
  $("status").textContent = snapshot.status.message;
  $("status").className = `status-indicator ${snapshot.status.kind}`;
  modelReady = snapshot.controls.analyze;
  updateAnalyze();
}

function fillList(id, lines) {
  const list = $(id);
  list.replaceChildren();
  for (const line of lines) {
    const item = document.createElement("li");
    item.textContent = line;
    list.appendChild(item);
  }
}

$("file").addEventListener("change", () => {
  if (previewUrl) { URL.revokeObjectURL(previewUrl); previewUrl = null; }
  $("results").style.display = "none";
  const file = $("file").files[0];
  if (file) {
    previewUrl = URL.createObjectURL(file);
    $("preview").src = previewUrl;
  }
  updateAnalyze();
});

$("analyze").addEventListener("click", async () => {
  const file = $("file").files[0];
  if (!file) { return; }
  $("results").style.display = "none";
  const form = new FormData();
  form.append("image", file);
  const resp = await fetch("/api/analyze", { method: "POST", body: form });
  const body = await resp.json();
  if (!resp.ok) {
    alert(body.message);
    return;
  }
  fillList("classification", body.classification);
  fillList("detection", body.detection);
  $("annotated").src = `/api/annotated?t=${Date.now()}`;
  $("results").style.display = "block";
});

new EventSource("/api/status/stream").onmessage = (e) => showStatus(JSON.parse(e.data));
</script>
</body>
</html>
"#;
