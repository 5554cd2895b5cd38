//! Console API
//!
//! Routes console.log, console.warn, console.error, etc. to `tracing`.

use std::fmt::Write;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

#[derive(Debug, Clone, Copy)]
enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Install the console API into the global object
pub fn install_console(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    for (name, level) in [
        ("log", Level::Info),
        ("info", Level::Info),
        ("debug", Level::Debug),
        ("trace", Level::Trace),
        ("warn", Level::Warn),
        ("error", Level::Error),
    ] {
        console.set(
            name,
            Function::new(ctx.clone(), move |args: Rest<Value>| {
                log_with_level(level, &args.0);
            })?
            .with_name(name)?,
        )?;
    }
    ctx.globals().set("console", console)?;
    Ok(())
}

fn log_with_level(level: Level, values: &[Value]) {
    let mut output = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        format_value(&mut output, value);
    }

    match level {
        Level::Error => tracing::error!("[JS] {}", output),
        Level::Warn => tracing::warn!("[JS] {}", output),
        Level::Debug => tracing::debug!("[JS] {}", output),
        Level::Trace => tracing::trace!("[JS] {}", output),
        Level::Info => tracing::info!("[JS] {}", output),
    }
}

/// Format a value like the browser console does for its summary line
fn format_value(out: &mut String, value: &Value) {
    if value.is_undefined() {
        out.push_str("undefined");
    } else if value.is_null() {
        out.push_str("null");
    } else if let Some(b) = value.as_bool() {
        write!(out, "{}", b).ok();
    } else if let Some(n) = value.as_int() {
        write!(out, "{}", n).ok();
    } else if let Some(n) = value.as_float() {
        write!(out, "{}", n).ok();
    } else if let Some(s) = value.as_string() {
        if let Ok(s) = s.to_string() {
            out.push_str(&s);
        }
    } else if let Some(ex) = value.as_exception() {
        out.push_str(&ex.message().unwrap_or_else(|| "Error".to_string()));
    } else if let Some(array) = value.as_array() {
        write!(out, "Array({})", array.len()).ok();
    } else if value.is_function() {
        out.push_str("[Function]");
    } else if value.is_object() {
        out.push_str("[Object]");
    } else {
        out.push_str("[unknown]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_console_log() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();

        context.with(|ctx| {
            install_console(&ctx).unwrap();
            let _: Value = ctx.eval("console.log('test message')").unwrap();
            let _: Value = ctx.eval("console.error('Hello', 42, true, null, [1, 2])").unwrap();
        });
    }

    #[test]
    fn test_format_value() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();

        context.with(|ctx| {
            let values: Vec<Value> = ctx.eval("['a', 1, 2.5, undefined, [1, 2, 3], new Error('boom')]").unwrap();
            let mut out = String::new();
            for v in &values {
                format_value(&mut out, v);
                out.push('|');
            }
            assert_eq!(out, "a|1|2.5|undefined|Array(3)|boom|");
        });
    }
}
