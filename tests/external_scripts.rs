use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use page_script::{
    DiagnosticKind, Document, ExecutionEngine, HttpScriptFetcher, ScriptConfig, ScriptFetcher,
    ScriptSource,
};
use url::Url;

/// Minimal HTTP/1.1 server answering one request per connection.
struct ScriptServer {
    base: Url,
    user_agents: Arc<Mutex<Vec<String>>>,
}

impl ScriptServer {
    fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?;
        let user_agents = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&user_agents);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    let _ = serve(stream, &seen);
                });
            }
        });
        let base = Url::parse(&format!("http://{address}/page/index.html"))
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        Ok(Self { base, user_agents })
    }

    fn url(&self, path: &str) -> Url {
        self.base.join(path).expect("test path joins")
    }
}

fn serve(stream: TcpStream, user_agents: &Mutex<Vec<String>>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();

    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 || header == "\r\n" {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("user-agent") {
                user_agents
                    .lock()
                    .expect("user agent log")
                    .push(value.trim().to_string());
            }
        }
    }

    let (status, body) = match path.as_str() {
        "/page/ok.js" => (
            "200 OK",
            r#"document.getElementById("out").textContent += "ok;";"#,
        ),
        "/lib/shared.js" => ("200 OK", "var shared = 'from server';"),
        "/page/redirect.js" => {
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 302 Found\r\nLocation: /page/ok.js\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            )?;
            return stream.flush();
        }
        "/page/created.js" => ("201 Created", "document.title = 'should not run';"),
        "/page/slow.js" => {
            thread::sleep(Duration::from_millis(1500));
            ("200 OK", "document.title = 'too late';")
        }
        _ => ("404 Not Found", "not found"),
    };
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: application/javascript\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}

fn config() -> ScriptConfig {
    ScriptConfig::default()
        .with_user_agent("page-script-test/1.0")
        .with_fetch_timeout(Duration::from_millis(400))
}

#[test]
fn http_fetcher_returns_the_body_of_a_200_response() -> page_script::Result<()> {
    let server = ScriptServer::start().expect("server starts");
    let fetcher = HttpScriptFetcher::new(&config())?;
    let body = fetcher.fetch(&server.url("/lib/shared.js"))?;
    assert_eq!(body, "var shared = 'from server';");
    assert_eq!(
        server.user_agents.lock().expect("user agent log").as_slice(),
        ["page-script-test/1.0"]
    );
    Ok(())
}

#[test]
fn http_fetcher_rejects_every_status_other_than_200() -> page_script::Result<()> {
    let server = ScriptServer::start().expect("server starts");
    let fetcher = HttpScriptFetcher::new(&config())?;

    match fetcher.fetch(&server.url("missing.js")) {
        Err(page_script::Error::Fetch { reason, .. }) => {
            assert_eq!(reason, "failed to fetch script, status code: 404");
        }
        other => panic!("expected 404 fetch error, got {other:?}"),
    }
    match fetcher.fetch(&server.url("created.js")) {
        Err(page_script::Error::Fetch { reason, .. }) => {
            assert_eq!(reason, "failed to fetch script, status code: 201");
        }
        other => panic!("expected 201 fetch error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn http_fetcher_follows_redirects_and_times_out() -> page_script::Result<()> {
    let server = ScriptServer::start().expect("server starts");
    let fetcher = HttpScriptFetcher::new(&config())?;

    let body = fetcher.fetch(&server.url("redirect.js"))?;
    assert!(body.contains("ok;"), "{body}");

    match fetcher.fetch(&server.url("slow.js")) {
        Err(page_script::Error::Fetch { url, .. }) => assert!(url.ends_with("/page/slow.js")),
        other => panic!("expected timeout, got {other:?}"),
    }
    Ok(())
}

#[test]
fn engine_fetches_resolves_and_runs_externals_over_http() -> page_script::Result<()> {
    let server = ScriptServer::start().expect("server starts");
    let document = Document::parse(
        r#"<p id="out"></p>
           <script>document.getElementById("out").textContent += shared;</script>
           <script src="ok.js"></script>
           <script src="/lib/shared.js"></script>
           <script src="missing.js"></script>
           <script src="slow.js"></script>"#,
    );
    let mut engine = ExecutionEngine::new(config())?;
    let report = engine.execute(&document, &server.base)?;

    assert_eq!(document.text("#out")?.as_deref(), Some("ok;from server"));
    assert_eq!(report.external_found, 4);
    assert_eq!(
        report.executed,
        vec![
            ScriptSource::External { url: "ok.js".into() },
            ScriptSource::External { url: "/lib/shared.js".into() },
            ScriptSource::Inline { index: 0 },
        ]
    );
    assert_eq!(
        report.failed,
        vec![
            ScriptSource::External { url: "missing.js".into() },
            ScriptSource::External { url: "slow.js".into() },
        ]
    );
    assert_eq!(report.diagnostics.of_kind(DiagnosticKind::FetchFailed).count(), 2);
    Ok(())
}
