use std::io::{self, Write};

use super::config::{OutputConfig, OutputFormat};
use super::types::Envelope;

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.pretty { serde_json::to_writer_pretty(&mut *w, env).map_err(to_io)? } else { serde_json::to_writer(&mut *w, env).map_err(to_io)? }
        writeln!(w)
    }
}

pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        let (label, body) = if env.apply { ("Result", &env.result) } else { ("Plan", &env.plan) };
        writeln!(w, "{}: {}", label, env.op)?;
        if self.pretty {
            if let Some(body) = body { serde_json::to_writer_pretty(&mut *w, body).map_err(to_io)?; writeln!(w)?; }
        }
        Ok(())
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn new(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout();
        self.emit_to(env, &mut out)?;
        out.flush()
    }

    pub fn emit_to(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        self.presenter.emit(env, w)
    }
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::other(e) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(cfg: OutputConfig, env: &Envelope) -> String {
        let mut buf = Vec::new();
        Emitter::new(cfg).emit_to(env, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn json_is_one_line() {
        let env = Envelope::result("run", &json!({"written": 2}), None).unwrap();
        let out = render(OutputConfig { format: OutputFormat::Json, pretty: false }, &env);
        assert_eq!(out.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["result"]["written"], 2);
        assert_eq!(v["schema_version"], "digest.v1");
    }

    #[test]
    fn text_names_plan_or_result() {
        let plan = Envelope::plan("run", &json!({"written": 1}), None).unwrap();
        assert_eq!(render(OutputConfig { format: OutputFormat::Text, pretty: false }, &plan), "Plan: run\n");
        let pretty = render(OutputConfig { format: OutputFormat::Text, pretty: true }, &plan);
        assert!(pretty.starts_with("Plan: run\n{"));
    }
}
