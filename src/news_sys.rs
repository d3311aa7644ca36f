use std::{
    sync::{Arc, RwLock},
    time::Duration,
};
use rocket::{
    State,
    response::content::Json,
};
use quick_xml::{
    self as xml,
    events::Event,
};
use serde_json::{json, Value as JsonValue};

use crate::error::{SiagaError, SiagaResult};
use crate::task_scheduler::{Task, TaskSchedulerBuilder};


const MAX_ITEMS: usize = 20;
const MAX_SUMMARY_CHARS: usize = 280;
const NEWS_PERIOD: u64 = 60 * 15; // seconds
const RETRY_PERIOD: u64 = 60; // seconds


#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: String,
}

impl NewsItem {
    fn to_json(&self) -> JsonValue {
        json!({
            "judul": self.title,
            "tautan": self.link,
            "ringkasan": self.summary,
            "tanggal": self.published,
            "sumber": "BNPB",
        })
    }
}


/// Last good news payload, served as is.
pub struct NewsCache {
    data: RwLock<String>,
}

impl NewsCache {
    pub fn new() -> Self {
        NewsCache {
            data: RwLock::new(stringify_news(&demo_news(), true)),
        }
    }

    fn update(&self, data: String) {
        *self.data.write().unwrap_or_else(|p| p.into_inner()) = data;
    }

    fn get(&self) -> String {
        self.data.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}


pub fn init_news_sys(cache: Arc<NewsCache>, url: Option<String>, timeout: Duration,
    scheduler: &mut TaskSchedulerBuilder) {

    let url = match url {
        Some(url) => url,
        None => {
            info!("No news feed configured, serving demo news");
            return;
        },
    };

    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(err) => {
            warn!("Fail to build the news client: {}", err);
            return;
        },
    };

    let job = move || {
        info!("Start news job");

        match fetch_news(&client, &url) {
            Ok(items) => {
                cache.update(stringify_news(&items, false));
                Duration::new(NEWS_PERIOD, 0)
            },
            Err(err) => {
                warn!("Fail to get news: {}", err);
                Duration::new(RETRY_PERIOD, 0)
            },
        }
    };

    scheduler.add_task(Task::new("news", job, Duration::new(0, 0)));
}

#[get("/berita-bnpb")]
pub fn get_bnpb_news(cache: State<Arc<NewsCache>>) -> Json<String> {
    Json(cache.get())
}

#[get("/api/news")]
pub fn get_news(cache: State<Arc<NewsCache>>) -> Json<String> {
    Json(cache.get())
}


fn fetch_news(client: &reqwest::Client, url: &str) -> SiagaResult<Vec<NewsItem>> {
    let mut res = client.get(url).send()?;
    let status = res.status();
    let body = res.text()?;

    if !status.is_success() {
        return Err(SiagaError::rejected(status.as_u16(), &body));
    }

    parse_rss(&body)
}

fn stringify_news(items: &[NewsItem], demo: bool) -> String {
    let parts = items.iter()
        .map(NewsItem::to_json)
        .collect::<Vec<_>>();

    json!({
        "data": parts,
        "size": parts.len(),
        "demo": demo,
    }).to_string()
}

fn demo_news() -> Vec<NewsItem> {
    vec![
        NewsItem {
            title: "BNPB Imbau Warga Waspada Banjir di Musim Hujan".into(),
            link: "https://bnpb.go.id/berita".into(),
            summary: "Masyarakat diminta menyiapkan tas siaga bencana dan memantau informasi cuaca.".into(),
            published: String::new(),
        },
        NewsItem {
            title: "Simulasi Evakuasi Gempa Digelar Serentak".into(),
            link: "https://bnpb.go.id/berita".into(),
            summary: "Latihan evakuasi melibatkan sekolah, kantor pemerintahan dan relawan.".into(),
            published: String::new(),
        },
        NewsItem {
            title: "Posko Pengungsian Disiagakan di Daerah Rawan Longsor".into(),
            link: "https://bnpb.go.id/berita".into(),
            summary: "Pemerintah daerah menyiapkan posko dan logistik untuk warga terdampak.".into(),
            published: String::new(),
        },
    ]
}

fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => (),
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_SUMMARY_CHARS {
        collapsed.chars().take(MAX_SUMMARY_CHARS).collect::<String>() + "…"
    }
    else {
        collapsed
    }
}

fn parse_rss(xml_str: &str) -> SiagaResult<Vec<NewsItem>> {
    let mut reader = xml::Reader::from_str(xml_str);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    let mut name = Vec::new();
    let mut in_item = false;
    let mut item = NewsItem::default();

    loop {
        let text = match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => {
                name.clear();
                name.extend_from_slice(e.name());

                if e.name() == b"item" {
                    in_item = true;
                    item = NewsItem::default();
                }
                None
            },
            Ok(Event::End(ref e)) => {
                if e.name() == b"item" {
                    in_item = false;
                    if !item.title.is_empty() {
                        items.push(item.clone());
                    }
                }
                name.clear();
                None
            },
            Ok(Event::Text(e)) => Some(e.unescape_and_decode(&reader)?),
            Ok(Event::CData(e)) => Some(String::from_utf8_lossy(&e).into_owned()),
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => None,
        };

        if let (true, Some(text)) = (in_item, text) {
            match name.as_slice() {
                b"title" => item.title.push_str(text.trim()),
                b"link" => item.link.push_str(text.trim()),
                b"description" => item.summary = strip_tags(&text),
                b"pubDate" => item.published.push_str(text.trim()),
                _ => (),
            }
        }

        buf.clear();

        if items.len() >= MAX_ITEMS {
            break;
        }
    }

    Ok(items)
}
