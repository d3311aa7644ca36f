use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};
use chrono::Local;
use rocket::{
    State,
    request::LenientForm,
    response::content::Json,
};
use serde_json::json;

use crate::error::{SiagaError, SiagaResult};
use crate::util;


pub type SharedMailer = Arc<dyn Mailer>;


const EMERGENCY_HEADERS: [(&'static str, &'static str); 4] = [
    ("X-Priority", "1"),
    ("Importance", "High"),
    ("Precedence", "urgent"),
    ("X-Auto-Response-Suppress", "OOF, AutoReply"),
];

const MAX_RECIPIENTS: usize = 100;


#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub text: String,
    pub url: String,
}

/// One notification email, rendered the same way for every recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub greeting: String,
    pub lines: Vec<String>,
    pub action: Option<Action>,
    pub salutation: String,
    pub headers: Vec<(String, String)>,
}

impl Notification {
    pub fn email(subject: &str, message: &str) -> Self {
        Notification {
            subject: subject.trim().to_owned(),
            greeting: "Halo,".into(),
            lines: split_lines(message),
            action: None,
            salutation: "Salam,\nTim GeoSiaga".into(),
            headers: Vec::new(),
        }
    }

    pub fn emergency(subject: &str, message: &str) -> Self {
        let mut lines = split_lines(message);
        lines.push("Segera ikuti arahan petugas dan menuju titik evakuasi terdekat.".into());

        Notification {
            subject: format!("[DARURAT] {}", subject.trim()),
            greeting: "Perhatian!".into(),
            lines,
            action: None,
            salutation: "Salam siaga,\nTim GeoSiaga".into(),
            headers: EMERGENCY_HEADERS.iter()
                .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        }
    }

    pub fn with_action(mut self, text: &str, url: &str) -> Self {
        self.action = Some(Action {
            text: text.trim().to_owned(),
            url: url.trim().to_owned(),
        });
        self
    }

    pub fn is_emergency(&self) -> bool {
        self.headers.iter().any(|(k, v)| k == "X-Priority" && v == "1")
    }

    pub fn body(&self) -> String {
        let mut body = String::new();
        body.push_str(&self.greeting);
        body.push_str("\n\n");

        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }

        if let Some(action) = &self.action {
            body.push('\n');
            body.push_str(&format!("{}: {}\n", action.text, action.url));
        }

        body.push('\n');
        body.push_str(&self.salutation);
        body.push('\n');
        body
    }

    pub fn render_mime(&self, from: &str, to: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("From: {}\r\n", from));
        out.push_str(&format!("To: {}\r\n", to));
        out.push_str(&format!("Subject: {}\r\n", self.subject));
        out.push_str(&format!("Date: {}\r\n", Local::now().to_rfc2822()));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("Content-Transfer-Encoding: 8bit\r\n");

        for (key, val) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", key, val));
        }

        out.push_str("\r\n");
        out.push_str(&self.body().replace('\n', "\r\n"));
        out
    }
}

fn split_lines(message: &str) -> Vec<String> {
    message.lines()
        .map(|l| l.trim_end().to_owned())
        .collect()
}


pub trait Mailer: Send + Sync {
    /// Returns an identifier of the queued message.
    fn send(&self, notification: &Notification, to: &str) -> SiagaResult<String>;
}

/// Drops rendered messages as `.eml` files for a relay to pick up.
pub struct OutboxMailer {
    dir: PathBuf,
    from: String,
}

impl OutboxMailer {
    pub fn new<P: Into<PathBuf>>(dir: P, from: &str) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(OutboxMailer {
            dir,
            from: from.to_owned(),
        })
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, notification: &Notification, to: &str) -> SiagaResult<String> {
        let (id, mut file) = loop {
            let id = format!("{}-{}.eml", Local::now().format("%Y%m%d%H%M%S"), util::generate_rand_id(12));
            let file_result = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&id));

            match file_result {
                Ok(file) => break (id, file),
                Err(ref err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        };

        file.write_all(notification.render_mime(&self.from, to).as_bytes())?;
        Ok(id)
    }
}


#[derive(FromForm)]
pub struct NotificationForm {
    recipients: String,
    subject: String,
    message: String,
    emergency: Option<bool>,
    action_text: Option<String>,
    action_url: Option<String>,
}

impl NotificationForm {
    fn recipients(&self) -> Vec<&str> {
        self.recipients.split(|c: char| c == ',' || c == ';')
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect()
    }

    fn verify_error(&self) -> Option<&'static str> {
        let recipients = self.recipients();

        if recipients.is_empty() {
            Some("At least one recipient is required")
        }
        else if recipients.len() > MAX_RECIPIENTS {
            Some("Too many recipients")
        }
        else if recipients.iter().any(|r| !is_address(r)) {
            Some("Invalid recipient address")
        }
        else if self.subject.trim().is_empty() {
            Some("The subject is required")
        }
        else if self.subject.contains(|c: char| c == '\r' || c == '\n') {
            Some("The subject must be a single line")
        }
        else if self.message.trim().is_empty() {
            Some("The message is required")
        }
        else {
            None
        }
    }

    fn to_notification(&self) -> Notification {
        let notification = if self.emergency.unwrap_or(false) {
            Notification::emergency(&self.subject, &self.message)
        }
        else {
            Notification::email(&self.subject, &self.message)
        };

        match (&self.action_text, &self.action_url) {
            (Some(text), Some(url)) if !url.trim().is_empty() => {
                let text = if text.trim().is_empty() { "Buka" } else { text };
                notification.with_action(text, url)
            },
            (None, Some(url)) if !url.trim().is_empty() => notification.with_action("Buka", url),
            _ => notification,
        }
    }
}

fn is_address(text: &str) -> bool {
    let mut parts = text.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(user), Some(host)) => !user.is_empty()
            && host.contains('.')
            && !host.starts_with('.')
            && !text.contains(|c: char| c.is_whitespace() || c == '<' || c == '>'),
        _ => false,
    }
}


/// Recipients that were queued and those that failed. One failure does not
/// stop the rest, so a retry only needs the failed addresses.
pub struct Dispatch {
    pub sent: Vec<String>,
    pub failed: Vec<(String, SiagaError)>,
}

pub fn dispatch(mailer: &dyn Mailer, notification: &Notification, recipients: &[&str]) -> Dispatch {
    let mut result = Dispatch {
        sent: Vec::new(),
        failed: Vec::new(),
    };

    for &to in recipients {
        match mailer.send(notification, to) {
            Ok(id) => result.sent.push(id),
            Err(err) => {
                error!("Fail to send a notification to {}: {}", to, err);
                result.failed.push((to.to_owned(), err));
            },
        }
    }

    result
}


#[post("/api/admin/notifications", format="application/x-www-form-urlencoded", data="<form>")]
pub fn post_notification(form: Option<LenientForm<NotificationForm>>,
    mailer: State<SharedMailer>) -> SiagaResult<Json<String>> {

    let form = form.ok_or_else(|| SiagaError::validation("Invalid notification form"))?;

    if let Some(err) = form.verify_error() {
        return Err(SiagaError::validation(err));
    }

    let notification = form.to_notification();
    let mut result = dispatch(mailer.inner().as_ref(), &notification, &form.recipients());

    if result.sent.is_empty() {
        if let Some((_, err)) = result.failed.pop() {
            return Err(err);
        }
    }

    info!("Notification \"{}\" queued for {} recipients, {} failed",
        notification.subject, result.sent.len(), result.failed.len());

    let message = if result.failed.is_empty() {
        "Notifikasi berhasil dikirim"
    }
    else {
        "Sebagian notifikasi gagal dikirim"
    };

    Ok(Json(json!({
        "message": message,
        "darurat": notification.is_emergency(),
        "terkirim": result.sent.len(),
        "gagal": result.failed.iter().map(|(to, _)| to.as_str()).collect::<Vec<_>>(),
    }).to_string()))
}


#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use rocket::http::{ContentType, Status};
    use serde_json::Value as JsonValue;

    use crate::backend::memory::MemoryBackend;
    use crate::tests::client_with;

    /// Keeps rendered messages in memory.
    #[derive(Default)]
    pub struct MemoryMailer {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl Mailer for MemoryMailer {
        fn send(&self, notification: &Notification, to: &str) -> SiagaResult<String> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((to.to_owned(), notification.render_mime("noreply@geosiaga.id", to)));
            Ok(sent.len().to_string())
        }
    }

    #[test]
    fn emergency_carries_priority_headers() {
        let mime = Notification::emergency("Banjir", "Air naik 1 meter")
            .render_mime("noreply@geosiaga.id", "warga@example.com");

        assert!(mime.contains("Subject: [DARURAT] Banjir\r\n"));
        assert!(mime.contains("X-Priority: 1\r\n"));
        assert!(mime.contains("Importance: High\r\n"));
        assert!(mime.contains("Precedence: urgent\r\n"));
        assert!(mime.contains("X-Auto-Response-Suppress: OOF, AutoReply\r\n"));
        assert!(mime.contains("\r\n\r\nPerhatian!\r\n"));
    }

    #[test]
    fn plain_email_has_no_priority_headers() {
        let mail = Notification::email("Info", "Baris satu\nBaris dua")
            .with_action("Lihat peta", "https://geosiaga.id/peta");

        assert!(!mail.is_emergency());
        assert_eq!(mail.body(),
            "Halo,\n\nBaris satu\nBaris dua\n\nLihat peta: https://geosiaga.id/peta\n\nSalam,\nTim GeoSiaga\n");
        assert!(!mail.render_mime("a@b.id", "c@d.id").contains("X-Priority"));
    }

    #[test]
    fn outbox_writes_one_file_per_message() {
        let dir = std::env::temp_dir().join(format!("siaga-outbox-{}", util::generate_rand_id(8)));
        let mailer = OutboxMailer::new(&dir, "noreply@geosiaga.id").unwrap();

        let first = mailer.send(&Notification::email("A", "x"), "a@b.id").unwrap();
        let second = mailer.send(&Notification::email("A", "x"), "a@b.id").unwrap();
        assert_ne!(first, second);

        let text = fs::read_to_string(dir.join(&first)).unwrap();
        assert!(text.starts_with("From: noreply@geosiaga.id\r\nTo: a@b.id\r\n"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn addresses_are_checked() {
        assert!(is_address("relawan@bpbd.go.id"));
        assert!(!is_address("relawan"));
        assert!(!is_address("@bpbd.go.id"));
        assert!(!is_address("a@localhost"));
        assert!(!is_address("a b@c.id"));
    }

    #[test]
    fn endpoint_sends_to_each_recipient() {
        let (client, _) = client_with(MemoryBackend::new());

        let mut res = client.post("/api/admin/notifications")
            .header(ContentType::Form)
            .body("recipients=a%40b.id%2C+c%40d.id&subject=Gempa&message=Tetap+tenang&emergency=true")
            .dispatch();
        assert_eq!(res.status(), Status::Ok);

        let val: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
        assert_eq!(val["terkirim"], 2);
        assert_eq!(val["darurat"], true);
    }

    /// Refuses one address, queues the rest.
    struct FlakyMailer {
        refuse: &'static str,
        inner: MemoryMailer,
    }

    impl Mailer for FlakyMailer {
        fn send(&self, notification: &Notification, to: &str) -> SiagaResult<String> {
            if to == self.refuse {
                return Err(SiagaError::Network("relay refused".into()));
            }
            self.inner.send(notification, to)
        }
    }

    #[test]
    fn one_failed_recipient_does_not_stop_the_rest() {
        let mailer = FlakyMailer {
            refuse: "b@b.id",
            inner: MemoryMailer::default(),
        };
        let notification = Notification::emergency("Gempa", "Tetap tenang");

        let result = dispatch(&mailer, &notification, &["a@b.id", "b@b.id", "c@b.id"]);

        assert_eq!(result.sent.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0, "b@b.id");

        let queued = mailer.inner.sent.lock().unwrap();
        assert_eq!(queued.iter().map(|(to, _)| to.as_str()).collect::<Vec<_>>(), vec!["a@b.id", "c@b.id"]);
    }

    #[test]
    fn endpoint_reports_no_failures_when_all_sent() {
        let (client, _) = client_with(MemoryBackend::new());

        let mut res = client.post("/api/admin/notifications")
            .header(ContentType::Form)
            .body("recipients=a%40b.id&subject=Info&message=Halo")
            .dispatch();
        let val: JsonValue = serde_json::from_str(&res.body_string().unwrap()).unwrap();
        assert_eq!(val["gagal"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn endpoint_rejects_bad_recipients() {
        let (client, _) = client_with(MemoryBackend::new());

        let res = client.post("/api/admin/notifications")
            .header(ContentType::Form)
            .body("recipients=bukan-email&subject=Gempa&message=Tetap+tenang")
            .dispatch();
        assert_eq!(res.status(), Status::UnprocessableEntity);
    }
}
