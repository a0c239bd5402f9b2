use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use crate::error::{HaulError, Result};
use crate::models::{CollectionHeader, CollectionLineItem, LocationRecord};
use crate::reference::LocationSource;
use crate::settings::StoreConfig;

pub const COLLECTIONS_TABLE: &str = "recolecciones";
pub const LINE_ITEMS_TABLE: &str = "detalle_recolecciones";
const LOCATIONS_QUERY: &str = "locales?select=id,nombre,plaza_id,plazas(nombre)";

/// Longest response body excerpt carried in an error.
const BODY_EXCERPT: usize = 200;

/// Write side of the target store.
pub trait TargetStore {
    /// Inserts headers and returns their new ids in submission order.
    fn insert_collections(&self, headers: &[CollectionHeader]) -> Result<Vec<String>>;

    fn insert_line_items(&self, items: &[CollectionLineItem]) -> Result<()>;
}

/// PostgREST-style endpoint: `{url}/rest/v1/{table}`.
pub struct RestStore {
    client: HttpClient,
    base_url: String,
    headers: HeaderMap,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        // None disables reqwest's default 30s timeout.
        let client = HttpClient::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers.insert("apikey", header_value(&config.key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", config.key))?);

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url)
    }

    fn post<T: Serialize>(&self, table: &str, records: &[T]) -> Result<Vec<Value>> {
        let response = self
            .client
            .post(self.url(table))
            .headers(self.headers.clone())
            .json(records)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(remote_error(status.as_u16(), response.text().unwrap_or_default()));
        }
        let body: Value = response.json()?;
        match body {
            Value::Array(rows) => Ok(rows),
            other => Err(HaulError::MalformedResponse(format!(
                "expected an array from {table}, got {}",
                excerpt(&other.to_string())
            ))),
        }
    }
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|_| HaulError::Config("store_key contains invalid header characters".into()))
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT).collect()
}

fn remote_error(status: u16, body: String) -> HaulError {
    HaulError::Remote { status, body: excerpt(&body) }
}

/// Pulls the `id` of every returned row; string and numeric ids both work.
pub fn extract_ids(rows: &[Value]) -> Result<Vec<String>> {
    rows.iter()
        .map(|row| match row.get("id") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(HaulError::MalformedResponse(format!(
                "row without id: {}",
                excerpt(&row.to_string())
            ))),
        })
        .collect()
}

impl TargetStore for RestStore {
    fn insert_collections(&self, headers: &[CollectionHeader]) -> Result<Vec<String>> {
        let rows = self.post(COLLECTIONS_TABLE, headers)?;
        extract_ids(&rows)
    }

    fn insert_line_items(&self, items: &[CollectionLineItem]) -> Result<()> {
        self.post(LINE_ITEMS_TABLE, items)?;
        Ok(())
    }
}

impl LocationSource for RestStore {
    fn fetch_locations(&self) -> Result<Vec<LocationRecord>> {
        let response = self
            .client
            .get(self.url(LOCATIONS_QUERY))
            .headers(self.headers.clone())
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(remote_error(status.as_u16(), response.text().unwrap_or_default()));
        }
        let text = response.text()?;
        serde_json::from_str(&text)
            .map_err(|e| HaulError::MalformedResponse(format!("locations: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answers one request with `status` and `body`; the handle yields the
    /// raw request that came in.
    fn serve_once(status: &str, body: &str) -> (StoreConfig, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    length = v.trim().parse().unwrap();
                }
                request.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).unwrap();
            request.push_str(&String::from_utf8(body).unwrap());
            reader.get_mut().write_all(response.as_bytes()).unwrap();
            request
        });
        let config = StoreConfig {
            url: format!("http://127.0.0.1:{port}/"),
            key: "k".into(),
            timeout_secs: Some(5),
        };
        (config, handle)
    }

    fn header(location: &str) -> CollectionHeader {
        CollectionHeader {
            submitter_id: "u".into(),
            place_id: "p".into(),
            location_id: location.into(),
            collection_date: "2024-02-01".into(),
            notes: None,
        }
    }

    #[test]
    fn test_insert_collections_sends_auth_headers() {
        let (config, server) = serve_once("201 Created", r#"[{"id": "c1"}, {"id": 2}]"#);
        let store = RestStore::new(&config).unwrap();
        let ids = store.insert_collections(&[header("l1"), header("l2")]).unwrap();
        assert_eq!(ids, vec!["c1", "2"]);

        let request = server.join().unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /rest/v1/recolecciones HTTP/1.1"), "{request}");
        assert!(lower.contains("apikey: k\r\n"));
        assert!(lower.contains("authorization: bearer k\r\n"));
        assert!(lower.contains("prefer: return=representation\r\n"));
        assert!(lower.contains("content-type: application/json\r\n"));
        assert!(request.contains(r#""local_id":"l2""#));
    }

    #[test]
    fn test_non_success_status_is_remote_error() {
        let (config, server) = serve_once("500 Internal Server Error", r#"{"message":"boom"}"#);
        let store = RestStore::new(&config).unwrap();
        match store.insert_collections(&[header("l1")]) {
            Err(HaulError::Remote { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected a remote error, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_object_body_is_malformed() {
        let (config, server) = serve_once("201 Created", r#"{"id": "c1"}"#);
        let store = RestStore::new(&config).unwrap();
        assert!(matches!(
            store.insert_line_items(&[]),
            Err(HaulError::MalformedResponse(_))
        ));
        assert!(server.join().unwrap().starts_with("POST /rest/v1/detalle_recolecciones "));
    }

    #[test]
    fn test_fetch_locations_over_http() {
        let body = r#"[
            {"id": "L1", "nombre": "Zara", "plaza_id": "P1", "plazas": {"nombre": "Plaza Mall"}},
            {"id": "L2", "nombre": "Kiosko", "plaza_id": null, "plazas": null}
        ]"#;
        let (config, server) = serve_once("200 OK", body);
        let store = RestStore::new(&config).unwrap();
        let rows = store.fetch_locations().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].place_id.is_none());

        let request = server.join().unwrap();
        assert!(request
            .starts_with("GET /rest/v1/locales?select=id,nombre,plaza_id,plazas(nombre) HTTP/1.1"));
    }

    #[test]
    fn test_fetch_locations_rejects_non_array() {
        let (config, server) = serve_once("200 OK", r#"{"rows": []}"#);
        let store = RestStore::new(&config).unwrap();
        assert!(matches!(
            store.fetch_locations(),
            Err(HaulError::MalformedResponse(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_extract_ids_preserves_order() {
        let rows = vec![json!({"id": "b"}), json!({"id": 7}), json!({"id": "a"})];
        assert_eq!(extract_ids(&rows).unwrap(), vec!["b", "7", "a"]);
    }

    #[test]
    fn test_extract_ids_rejects_missing_id() {
        let rows = vec![json!({"id": "a"}), json!({"nombre": "x"})];
        assert!(matches!(extract_ids(&rows), Err(HaulError::MalformedResponse(_))));
    }

    #[test]
    fn test_wire_names() {
        let header = CollectionHeader {
            submitter_id: "u".into(),
            place_id: "p".into(),
            location_id: "l".into(),
            collection_date: "2024-02-01".into(),
            notes: None,
        };
        let v = serde_json::to_value(&header).unwrap();
        assert_eq!(v["usuario_id"], "u");
        assert_eq!(v["plaza_id"], "p");
        assert_eq!(v["local_id"], "l");
        assert_eq!(v["fecha_recoleccion"], "2024-02-01");
        assert!(v["notas"].is_null());

        let item = CollectionLineItem {
            collection_id: Some("c1".into()),
            material_type_id: "m".into(),
            weight_kg: 2.5,
            emissions_avoided: 0.25,
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["recoleccion_id"], "c1");
        assert_eq!(v["tipo_residuo_id"], "m");
        assert_eq!(v["kilos"], 2.5);
        assert_eq!(v["co2_evitado"], 0.25);
    }

    #[test]
    fn test_location_rows_deserialize() {
        let body = r#"[
            {"id": "L1", "nombre": "TIENDA A", "plaza_id": "P1", "plazas": {"nombre": "Plaza Mall"}},
            {"id": "L2", "nombre": "Kiosko", "plaza_id": "P2", "plazas": null}
        ]"#;
        let rows: Vec<LocationRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(rows[0].place.as_ref().unwrap().name, "Plaza Mall");
        assert!(rows[1].place.is_none());
    }

    #[test]
    fn test_location_rows_with_null_place_id() {
        let body = r#"[
            {"id": "L1", "nombre": "TIENDA A", "plaza_id": "P1", "plazas": {"nombre": "Plaza Mall"}},
            {"id": "L2", "nombre": "Kiosko", "plaza_id": null, "plazas": null}
        ]"#;
        let rows: Vec<LocationRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(rows[0].place_id.as_deref(), Some("P1"));
        assert!(rows[1].place_id.is_none());
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let config = StoreConfig {
            url: "https://db.example".into(),
            key: "bad\nkey".into(),
            timeout_secs: Some(5),
        };
        assert!(matches!(RestStore::new(&config), Err(HaulError::Config(_))));
    }
}
