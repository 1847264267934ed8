//! A scripted SMTP server answering a single session on a local port

#![allow(dead_code)]

use std::{
    io::{BufRead, BufReader, Write},
    net::{Ipv4Addr, TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// What the scripted server advertises and accepts
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Advertise `STARTTLS`. The upgrade itself is always refused.
    pub starttls: bool,
    /// Mechanisms listed after `AUTH`, none means the keyword is left out
    pub auth: Vec<&'static str>,
    /// The only credentials accepted
    pub credentials: Option<(&'static str, &'static str)>,
    /// Never send the greeting
    pub silent: bool,
    /// Greeting continuation lines sent before the greeting itself
    pub preamble: usize,
    /// Pause before each continuation line
    pub preamble_delay: Duration,
}

impl Script {
    /// A server accepting anonymous sessions
    pub fn open() -> Self {
        Self::default()
    }

    /// A server requiring the given credentials with `PLAIN` or `LOGIN`
    pub fn authenticated(username: &'static str, password: &'static str) -> Self {
        Self {
            auth: vec!["PLAIN", "LOGIN"],
            credentials: Some((username, password)),
            ..Self::default()
        }
    }
}

/// Handle on a running scripted server
#[derive(Debug)]
pub struct ScriptedServer {
    port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl ScriptedServer {
    pub fn start(script: Script) -> Self {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve(stream, &script)
        });

        Self { port, handle }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the session to end and returns the received lines
    pub fn lines(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

/// Whether one of the received lines starts with `command`
pub fn received(lines: &[String], command: &str) -> bool {
    lines.iter().any(|line| line.starts_with(command))
}

fn serve(stream: TcpStream, script: &Script) -> Vec<String> {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut lines = Vec::new();

    if script.silent {
        let mut buffer = String::new();
        while reader.read_line(&mut buffer).unwrap_or(0) > 0 {}
        return lines;
    }

    for _ in 0..script.preamble {
        thread::sleep(script.preamble_delay);
        if writer.write_all(b"220-scripted.test still greeting\r\n").is_err() {
            return lines;
        }
    }

    reply(&mut writer, "220 scripted.test ESMTP ready");

    while let Some(line) = read_line(&mut reader, &mut lines) {
        let upper = line.to_ascii_uppercase();

        if upper.starts_with("EHLO") {
            let mut response = vec!["250-scripted.test".to_owned()];
            if script.starttls {
                response.push("250-STARTTLS".to_owned());
            }
            if !script.auth.is_empty() {
                response.push(format!("250-AUTH {}", script.auth.join(" ")));
            }
            response.push("250 8BITMIME".to_owned());
            reply(&mut writer, &response.join("\r\n"));
        } else if upper.starts_with("AUTH PLAIN ") {
            let decoded = STANDARD.decode(&line["AUTH PLAIN ".len()..]).unwrap_or_default();
            let mut parts = decoded.split(|b| *b == 0).skip(1);
            let username = String::from_utf8_lossy(parts.next().unwrap_or_default());
            let password = String::from_utf8_lossy(parts.next().unwrap_or_default());
            reply(&mut writer, verdict(script, &username, &password));
        } else if upper == "AUTH LOGIN" {
            reply(&mut writer, "334 VXNlcm5hbWU6");
            let Some(username) = read_line(&mut reader, &mut lines) else {
                break;
            };
            reply(&mut writer, "334 UGFzc3dvcmQ6");
            let Some(password) = read_line(&mut reader, &mut lines) else {
                break;
            };
            let username = String::from_utf8(STANDARD.decode(username).unwrap_or_default())
                .unwrap_or_default();
            let password = String::from_utf8(STANDARD.decode(password).unwrap_or_default())
                .unwrap_or_default();
            reply(&mut writer, verdict(script, &username, &password));
        } else if upper == "STARTTLS" {
            reply(&mut writer, "454 4.7.0 TLS not available");
        } else if upper == "QUIT" {
            reply(&mut writer, "221 2.0.0 Bye");
            break;
        } else {
            reply(&mut writer, "502 5.5.2 Command not implemented");
        }
    }

    lines
}

fn reply(writer: &mut TcpStream, text: &str) {
    let _ = writer.write_all(format!("{text}\r\n").as_bytes());
}

fn read_line(reader: &mut BufReader<TcpStream>, lines: &mut Vec<String>) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = line.trim_end_matches("\r\n").to_owned();
            lines.push(line.clone());
            Some(line)
        }
    }
}

fn verdict(script: &Script, username: &str, password: &str) -> &'static str {
    match script.credentials {
        Some((expected_username, expected_password))
            if expected_username == username && expected_password == password =>
        {
            "235 2.7.0 Authentication successful"
        }
        _ => "535 5.7.8 Authentication credentials invalid",
    }
}
