//! 测试用的内存传输层：按 URL（不含查询串）返回预设响应并记录请求。

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

use super::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

type Reply = Result<HttpResponse, TransportError>;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Default)]
pub struct FakeTransport {
    // 依次返回，最后一个会一直重复
    routes: Mutex<HashMap<String, Vec<Reply>>>,
    log: Mutex<Vec<Recorded>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            body: Vec::new(),
        }
    }

    pub fn json_response(value: Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: serde_json::to_vec(&value).unwrap(),
        }
    }

    pub fn script(&self, url: &str, replies: Vec<Reply>) {
        assert!(!replies.is_empty());
        self.routes.lock().unwrap().insert(url.to_string(), replies);
    }

    pub fn json(&self, url: &str, value: Value) {
        self.script(url, vec![Ok(Self::json_response(value))]);
    }

    pub fn bytes(&self, url: &str, body: Vec<u8>) {
        self.script(url, vec![Ok(HttpResponse { status: 200, body })]);
    }

    pub fn remove(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|r| r.url == url).count()
    }

    pub fn hits_with_prefix(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .count()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }

    pub fn last_query(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.url == url)
            .map(|r| r.query.clone())
    }

    pub fn timeouts(&self, url: &str) -> Vec<Duration> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .map(|r| r.timeout)
            .collect()
    }
}

impl HttpTransport for FakeTransport {
    fn get(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        self.log.lock().unwrap().push(Recorded {
            url: request.url.to_string(),
            query: request.query.to_vec(),
            timeout: request.timeout,
        });

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(request.url) {
            Some(replies) if replies.len() > 1 => replies.remove(0),
            Some(replies) => replies[0].clone(),
            None => Ok(Self::status_response(404)),
        }
    }
}

pub fn manga_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "type": "manga",
        "attributes": {"title": {"en": name}, "tags": []},
        "relationships": []
    })
}

pub fn chapter_json(id: &str, number: &str, title: Option<&str>, pages: u32) -> Value {
    json!({
        "id": id,
        "type": "chapter",
        "attributes": {
            "chapter": number,
            "title": title,
            "translatedLanguage": "en",
            "pages": pages
        }
    })
}

pub fn feed_page(numbers: &[&str], total: usize) -> HttpResponse {
    let data: Vec<Value> = numbers
        .iter()
        .map(|n| chapter_json(&format!("c{n}"), n, None, 1))
        .collect();
    FakeTransport::json_response(json!({"data": data, "total": total}))
}

pub fn manifest_json(base_url: &str, hash: &str, files: &[&str]) -> Value {
    json!({
        "result": "ok",
        "baseUrl": base_url,
        "chapter": {"hash": hash, "data": files, "dataSaver": []}
    })
}

/// 一张可解码的小 PNG。
pub fn png_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([shade, shade, 255 - shade]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
