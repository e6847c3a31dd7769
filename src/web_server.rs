use std::{
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

use esp_idf_svc::{
    hal::reset,
    http::{
        self,
        server::{EspHttpConnection, EspHttpServer, Request},
        Method,
    },
    io::{Read, Write},
};
use log::{info, warn};

use crate::{
    app::Job,
    calibration::CalibrationKind,
    post_data::PostData,
    runtime::{Command, Response},
    string_error::StringError,
};

const REPLY_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_LEN: usize = 1024;

/// Forwards `command` to the device loop and waits for its answer.
pub fn dispatch(jobs: &Sender<Job>, command: Command) -> anyhow::Result<Response> {
    let (reply_tx, reply_rx) = mpsc::channel();

    jobs.send((command, reply_tx))
        .map_err(|_| StringError("Device loop stopped"))?;

    Ok(reply_rx
        .recv_timeout(REPLY_TIMEOUT)
        .map_err(|_| StringError("Device did not answer in time"))?)
}

fn write_response(req: Request<&mut EspHttpConnection>, response: Response) -> anyhow::Result<()> {
    req.into_response(200, None, &[("Content-Type", response.content_type)])?
        .write_all(response.body.as_bytes())?;
    Ok(())
}

fn write_error(req: Request<&mut EspHttpConnection>, status: u16, message: &str) -> anyhow::Result<()> {
    warn!("HTTP {}: {}", status, message);
    req.into_status_response(status)?
        .write_all(message.as_bytes())?;
    Ok(())
}

fn read_body(req: &mut Request<&mut EspHttpConnection>) -> Result<String, StringError> {
    let len_body = req
        .header("Content-Length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    if len_body == 0 {
        return Err(StringError("Save error: No body or no content-length"));
    } else if len_body > MAX_BODY_LEN {
        return Err(StringError("Save error: Content-length too long."));
    }

    let mut buffer = vec![0u8; len_body];
    let mut read = 0;
    while read < len_body {
        match req.read(&mut buffer[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(_) => return Err(StringError("Save error: Failed to read request.")),
        }
    }
    buffer.truncate(read);

    String::from_utf8(buffer).map_err(|_| StringError("Save error: Body is not UTF-8."))
}

fn add_command_route(
    server: &mut EspHttpServer<'static>,
    uri: &str,
    method: Method,
    jobs: &Sender<Job>,
    command: Command,
) -> anyhow::Result<()> {
    let jobs = jobs.clone();

    server.fn_handler::<anyhow::Error, _>(uri, method, move |req| {
        match dispatch(&jobs, command.clone()) {
            Ok(response) => write_response(req, response),
            Err(e) => write_error(req, 503, &e.to_string()),
        }
    })?;

    Ok(())
}

pub fn start(jobs: Sender<Job>) -> anyhow::Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&http::server::Configuration {
        stack_size: 10240,
        ..Default::default()
    })?;

    add_command_route(&mut server, "/", Method::Get, &jobs, Command::SettingsPage)?;
    add_command_route(&mut server, "/metrics", Method::Get, &jobs, Command::Metrics)?;
    add_command_route(&mut server, "/api", Method::Get, &jobs, Command::Status)?;
    add_command_route(
        &mut server,
        "/calibrate/dry",
        Method::Get,
        &jobs,
        Command::Calibrate(CalibrationKind::Dry),
    )?;
    add_command_route(
        &mut server,
        "/calibrate/wet",
        Method::Get,
        &jobs,
        Command::Calibrate(CalibrationKind::Wet),
    )?;

    {
        let jobs = jobs.clone();
        server.fn_handler::<anyhow::Error, _>("/save", Method::Post, move |mut req| {
            let body = match read_body(&mut req) {
                Ok(body) => body,
                Err(e) => return write_error(req, 400, e.0),
            };

            match dispatch(&jobs, Command::SaveConfig(PostData::from_string(body))) {
                Ok(response) => write_response(req, response),
                Err(e) => write_error(req, 503, &e.to_string()),
            }
        })?;
    }

    server.fn_handler::<anyhow::Error, _>("/reboot", Method::Post, |req| {
        req.into_ok_response()?.write_all(b"Rebooting...")?;

        thread::Builder::new()
            .name("restart-request".into())
            .spawn(|| {
                thread::sleep(Duration::from_millis(500));
                info!("Restarting");
                reset::restart();
            })?;

        Ok(())
    })?;

    info!("HTTP server started");
    Ok(server)
}
