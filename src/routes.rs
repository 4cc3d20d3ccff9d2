use std::io::Cursor;
use std::sync::Arc;

use chrono::Utc;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::{self, Json};
use rocket::{Route, State};
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::export::{self, ExportError, XLSX_MIME};
use crate::forward::{self, Notifier};
use crate::localize;
use crate::models::{Reading, StoredReading};
use crate::store::{ReadingStore, run_blocking};

const SAVED: &str = "Datos guardados correctamente";
const INVALID_JSON: &str = "JSON inválido";
const NO_DATA: &str = "No hay datos para exportar";
const NO_DATA_IN_RANGE: &str = "No hay datos en ese rango";
const MISSING_RANGE: &str = "Debes enviar parámetros 'inicio' y 'fin'";
const INVALID_DATE: &str = "Formato de fecha inválido";

const FULL_EXPORT_NAME: &str = "datos_completos.xlsx";
const FILTERED_EXPORT_NAME: &str = "lecturas_filtrado.xlsx";

/// Shared handles, built once at startup and managed by Rocket.
pub struct ServerState {
    pub store: Arc<dyn ReadingStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// An in-memory `.xlsx` served as a download.
#[derive(Debug)]
pub struct Spreadsheet {
    filename: &'static str,
    bytes: Vec<u8>,
}

impl<'r> Responder<'r, 'static> for Spreadsheet {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .raw_header("Content-Type", XLSX_MIME)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            )
            .sized_body(self.bytes.len(), Cursor::new(self.bytes))
            .ok()
    }
}

/*
Test With:
curl -X POST -H "Content-Type: application/json" -d '{"t1": 21.5, "t2": 19.25}' http://localhost:5000/api/datos
curl -OJ 'http://localhost:5000/api/descargar/filtrado?inicio=2024-01-01T00:00:00&fin=2024-01-02T00:00:00'
*/

#[post("/api/datos", data = "<body>")]
async fn create_reading(
    state: &State<ServerState>,
    body: Result<Json<Value>, json::Error<'_>>,
) -> ApiResult<(Status, Json<Value>)> {
    let reading = match body {
        Ok(Json(Value::Object(map))) if !map.is_empty() => map,
        Ok(Json(other)) => {
            debug!("Rejected non-object body: {}", other);
            return Err(ApiError::BadRequest(INVALID_JSON));
        }
        Err(err) => {
            debug!("Rejected unparsable body: {:?}", err);
            return Err(ApiError::BadRequest(INVALID_JSON));
        }
    };

    // Persist first; the display forward below must never undo or block this.
    let at = Utc::now();
    let reading = run_blocking(state.store.clone(), move |store| {
        store.insert(&reading, at).map(|()| reading)
    })
    .await?;

    let _ = forward::forward(state.notifier.as_ref(), &reading).await;

    Ok((Status::Created, Json(json!({ "mensaje": SAVED }))))
}

#[get("/api/datos")]
async fn list_readings(state: &State<ServerState>) -> ApiResult<Json<Vec<Reading>>> {
    let rows = run_blocking(state.store.clone(), |store| store.find_all()).await?;
    Ok(Json(rows.into_iter().map(StoredReading::into_document).collect()))
}

#[get("/api/descargar")]
async fn download_all(state: &State<ServerState>) -> ApiResult<Spreadsheet> {
    let rows = run_blocking(state.store.clone(), |store| store.find_all()).await?;
    spreadsheet(rows, FULL_EXPORT_NAME, NO_DATA)
}

#[get("/api/descargar/filtrado?<inicio>&<fin>")]
async fn download_range(
    state: &State<ServerState>,
    inicio: Option<String>,
    fin: Option<String>,
) -> ApiResult<Spreadsheet> {
    let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let (Some(inicio), Some(fin)) = (present(inicio), present(fin)) else {
        return Err(ApiError::BadRequest(MISSING_RANGE));
    };

    let parse = |text: &str| {
        localize::parse_instant(text).map_err(|err| {
            debug!("Rejected range bound: {}", err);
            ApiError::BadRequest(INVALID_DATE)
        })
    };
    let start = parse(inicio.as_str())?;
    let end = parse(fin.as_str())?;

    let rows = run_blocking(state.store.clone(), move |store| {
        store.find_in_range(start, end)
    })
    .await?;
    spreadsheet(rows, FILTERED_EXPORT_NAME, NO_DATA_IN_RANGE)
}

fn spreadsheet(
    rows: Vec<StoredReading>,
    filename: &'static str,
    empty: &'static str,
) -> ApiResult<Spreadsheet> {
    let records: Vec<Reading> = rows.into_iter().map(StoredReading::into_export_row).collect();
    match export::write_workbook(&records) {
        Ok(bytes) => {
            info!("Exported {} readings as {}", records.len(), filename);
            Ok(Spreadsheet { filename, bytes })
        }
        Err(ExportError::Empty) => Err(ApiError::NotFound(empty)),
        Err(err) => Err(err.into()),
    }
}

#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

#[catch(default)]
pub fn default_catcher(status: Status, _request: &Request<'_>) -> (Status, Json<Value>) {
    let message = status.reason().unwrap_or("Error");
    (status, Json(json!({ "error": message })))
}

pub fn api() -> Vec<Route> {
    routes![create_reading, list_readings, download_all, download_range, preflight]
}

/// Permissive CORS headers on every response, for the browser frontend.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        // Preflights get back whatever headers they ask for.
        let allowed_headers = request
            .headers()
            .get_one("Access-Control-Request-Headers")
            .filter(|requested| !requested.trim().is_empty())
            .unwrap_or("Content-Type")
            .to_string();

        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", allowed_headers));
    }
}
