use crate::model::{Event, EventPayload, MonthData, Subevent, YearData};
use reqwest::blocking::RequestBuilder;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Server(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Blocking client for the calendar backend. One request per user action;
/// responses are awaited before the screen updates, so there is no request
/// queueing or cancellation anywhere in here.
pub struct Client {
    http: reqwest::blocking::Client,
    base_url: String,
    cookie: Option<String>,
}

#[derive(Deserialize)]
struct EventsBody {
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct SubeventBody {
    subevent: Subevent,
}

impl Client {
    pub fn new(base_url: impl Into<String>, cookie: Option<String>) -> ApiResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Client {
            http,
            base_url,
            cookie,
        })
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.cookie {
            Some(cookie) => request.header(COOKIE, cookie.clone()),
            None => request,
        }
    }

    /// Sends a request and unwraps the `{status, message|data}` envelope.
    /// Data fields sit alongside `status`, so the body deserializes once as
    /// the envelope and once as the typed payload. A body with no `status`
    /// field (the month summary) counts as success.
    fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.with_session(request).send()?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let text = response.text()?;
        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(err) if status.is_success() => return Err(ApiError::Decode(err)),
            Err(_) => return Err(ApiError::Server(format!("HTTP {}", status))),
        };
        check_envelope(&body)?;
        if !status.is_success() {
            return Err(ApiError::Server(format!("HTTP {}", status)));
        }
        Ok(serde_json::from_value(body)?)
    }

    fn execute_ack(&self, request: RequestBuilder) -> ApiResult<()> {
        let _: Value = self.execute(request)?;
        Ok(())
    }

    pub fn get_month(&self, year: i32, month: u32) -> ApiResult<MonthData> {
        let request = self
            .http
            .get(self.url("/get_month"))
            .query(&[("year", year.to_string()), ("month", month.to_string())]);
        self.execute(request)
    }

    pub fn get_year(&self, year: i32) -> ApiResult<YearData> {
        let request = self
            .http
            .get(self.url("/get_year"))
            .query(&[("year", year.to_string())]);
        self.execute(request)
    }

    pub fn day_events(&self, year: i32, month: u32, day: u32) -> ApiResult<Vec<Event>> {
        let request = self.http.get(self.url("/events")).query(&[
            ("year", year.to_string()),
            ("month", month.to_string()),
            ("day", day.to_string()),
        ]);
        let body: EventsBody = self.execute(request)?;
        Ok(body.events)
    }

    pub fn month_events(&self, year: i32, month: u32) -> ApiResult<Vec<Event>> {
        let request = self
            .http
            .get(self.url("/events/month"))
            .query(&[("year", year.to_string()), ("month", month.to_string())]);
        let body: EventsBody = self.execute(request)?;
        Ok(body.events)
    }

    pub fn create_event(&self, payload: &EventPayload) -> ApiResult<()> {
        self.execute_ack(self.http.post(self.url("/events")).json(payload))
    }

    pub fn update_event(&self, id: i64, payload: &EventPayload) -> ApiResult<()> {
        self.execute_ack(
            self.http
                .put(self.url(&format!("/events/{}", id)))
                .json(payload),
        )
    }

    pub fn delete_event(&self, id: i64) -> ApiResult<()> {
        self.execute_ack(self.http.delete(self.url(&format!("/events/{}", id))))
    }

    pub fn get_subevent(&self, id: i64) -> ApiResult<Subevent> {
        let body: SubeventBody = self
            .execute(self.http.get(self.url(&format!("/events/subevents/{}", id))))?;
        Ok(body.subevent)
    }

    pub fn create_subevent(&self, event_id: i64, payload: &EventPayload) -> ApiResult<()> {
        self.execute_ack(
            self.http
                .post(self.url(&format!("/events/{}/subevents", event_id)))
                .json(payload),
        )
    }

    pub fn update_subevent(&self, id: i64, payload: &EventPayload) -> ApiResult<()> {
        self.execute_ack(
            self.http
                .put(self.url(&format!("/events/subevents/{}", id)))
                .json(payload),
        )
    }

    pub fn delete_subevent(&self, id: i64) -> ApiResult<()> {
        self.execute_ack(
            self.http
                .delete(self.url(&format!("/events/subevents/{}", id))),
        )
    }

    /// `color: None` clears the day's mood.
    pub fn set_mood(&self, year: i32, month: u32, day: u32, color: Option<&str>) -> ApiResult<()> {
        let body = serde_json::json!({
            "year": year,
            "month": month,
            "day": day,
            "color": color,
        });
        self.execute_ack(self.http.post(self.url("/mood/update")).json(&body))
    }

    /// Form-encoded credentials; on success the session cookie from
    /// `Set-Cookie` replaces whatever was held. Failure bodies carry
    /// `{"error": message}` rather than the usual status envelope.
    pub fn login(&mut self, username: &str, password: &str) -> ApiResult<()> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .form(&[("username", username), ("password", password)])
            .send()?;
        let status = response.status();
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(|raw| raw.split(';').next().unwrap_or(raw).trim().to_string());
        let text = response.text()?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    body.get("error")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("login failed (HTTP {})", status));
            return Err(ApiError::Server(message));
        }
        if let Some(cookie) = cookie {
            self.cookie = Some(cookie);
        }
        Ok(())
    }

    pub fn logout(&mut self) -> ApiResult<()> {
        let request = self.http.get(self.url("/auth/logout"));
        self.with_session(request).send()?;
        self.cookie = None;
        Ok(())
    }
}

fn check_envelope(body: &Value) -> ApiResult<()> {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown server error")
            .to_string();
        return Err(ApiError::Server(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> Client {
        Client::new(server.url(), None).unwrap()
    }

    #[test]
    fn get_month_parses_body_without_status_field() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/get_month")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("year".into(), "2025".into()),
                Matcher::UrlEncoded("month".into(), "3".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r##"{
                    "calendar_data": {"prev_days": [24, 25], "current_days": [1, 2], "next_days": [1]},
                    "month_label": "March 2025",
                    "mood_colors": {"2": "#90be6d"},
                    "days_with_events": [1],
                    "days_with_marker": []
                }"##,
            )
            .create();

        let month = client(&server).get_month(2025, 3).unwrap();
        mock.assert();
        assert_eq!(month.month_label, "March 2025");
        assert_eq!(month.days_with_events, vec![1]);
    }

    #[test]
    fn enveloped_error_surfaces_server_message() {
        let mut server = mockito::Server::new();
        server
            .mock("DELETE", "/events/42")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "error", "message": "Event not found"}"#)
            .create();

        let err = client(&server).delete_event(42).unwrap_err();
        match err {
            ApiError::Server(message) => assert_eq!(message, "Event not found"),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[test]
    fn http_401_maps_to_unauthorized() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/events")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "error", "message": "Authentication required"}"#)
            .create();

        let err = client(&server).day_events(2025, 3, 5).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn day_events_parses_nested_subevents() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("year".into(), "2025".into()),
                Matcher::UrlEncoded("month".into(), "3".into()),
                Matcher::UrlEncoded("day".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "status": "success",
                    "events": [{
                        "id": 3,
                        "name": "dinner",
                        "start_time": "2025-03-05 19:00",
                        "end_time": "2025-03-05 21:30",
                        "where": null,
                        "with_who": "ana",
                        "notes": null,
                        "subevents": [{
                            "id": 9,
                            "event_id": 3,
                            "name": "dessert",
                            "start_time": "2025-03-05 21:00",
                            "end_time": null,
                            "where": null,
                            "notes": null
                        }]
                    }]
                }"#,
            )
            .create();

        let events = client(&server).day_events(2025, 3, 5).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].with_who.as_deref(), Some("ana"));
        assert_eq!(events[0].subevents[0].name, "dessert");
    }

    #[test]
    fn create_event_posts_form_payload_json() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/events")
            .match_body(Matcher::Json(json!({
                "name": "run",
                "start_date": "05-03-2025",
                "start_time": "07:00",
                "end_date": "05-03-2025",
                "end_time": null,
                "where": null,
                "with_who": null,
                "notes": null
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "success", "message": "Event created successfully"}"#)
            .create();

        let payload = EventPayload {
            name: "run".into(),
            start_date: "05-03-2025".into(),
            start_time: Some("07:00".into()),
            end_date: "05-03-2025".into(),
            ..EventPayload::default()
        };
        client(&server).create_event(&payload).unwrap();
        mock.assert();
    }

    #[test]
    fn mood_clear_sends_null_color() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/mood/update")
            .match_body(Matcher::Json(json!({
                "year": 2025,
                "month": 3,
                "day": 5,
                "color": null
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "success"}"#)
            .create();

        client(&server).set_mood(2025, 3, 5, None).unwrap();
        mock.assert();
    }

    #[test]
    fn session_cookie_rides_every_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/events/subevents/9")
            .match_header("cookie", "session=abc123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "status": "success",
                    "subevent": {
                        "id": 9,
                        "event_id": 3,
                        "name": "dessert",
                        "start_time": "2025-03-05 21:00",
                        "end_time": null,
                        "where": null,
                        "notes": null
                    }
                }"#,
            )
            .create();

        let client = Client::new(server.url(), Some("session=abc123".into())).unwrap();
        let subevent = client.get_subevent(9).unwrap();
        mock.assert();
        assert_eq!(subevent.id, 9);
    }

    #[test]
    fn login_captures_session_cookie() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/login")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "maya".into()),
                Matcher::UrlEncoded("password".into(), "hunter2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("set-cookie", "session=abc123; HttpOnly; Path=/")
            .with_body(r#"{"message": "ok"}"#)
            .create();

        let mut client = client(&server);
        client.login("maya", "hunter2").unwrap();
        assert_eq!(client.cookie(), Some("session=abc123"));
    }

    #[test]
    fn login_failure_surfaces_error_body() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Invalid credentials"}"#)
            .create();

        let err = client(&server).login("maya", "wrong").unwrap_err();
        match err {
            ApiError::Server(message) => assert_eq!(message, "Invalid credentials"),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[test]
    fn logout_drops_cookie() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/auth/logout")
            .with_status(200)
            .with_body("")
            .create();

        let mut client = Client::new(server.url(), Some("session=abc123".into())).unwrap();
        client.logout().unwrap();
        assert!(client.cookie().is_none());
    }
}
