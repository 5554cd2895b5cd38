//! XHR bridge
//!
//! `XMLHttpRequest` and `fetch` in the prelude both end in the `xhr`
//! native. The request runs on a blocking thread through the embedder's
//! collaborator; its completion is handed to the session scheduler, which
//! calls [`ScriptHost::complete_xhr`](crate::ScriptHost::complete_xhr) on
//! the script thread.

use std::rc::Rc;

use rquickjs::{Ctx, Function, Object, Value};

use crate::bridge;
use crate::callbacks::{XhrRequest, XhrResponse};
use crate::host::{ScriptHost, Task};
use crate::realm::{JsHandle, Realm};

/// Outcome delivered to the script callback
pub type XhrResult = Result<XhrResponse, String>;

pub(crate) fn install<'js>(ctx: &Ctx<'js>, host: &Object<'js>, realm: &Rc<Realm>) -> rquickjs::Result<()> {
    let r = realm.clone();
    host.set(
        "xhr",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  method: String,
                  uri: String,
                  headers: Vec<Vec<String>>,
                  body: Option<String>,
                  callback: Value<'js>|
                  -> rquickjs::Result<()> {
                let mut request = XhrRequest::new(&method, &uri);
                request.headers = headers
                    .into_iter()
                    .filter_map(|pair| {
                        let mut it = pair.into_iter();
                        Some((it.next()?, it.next()?))
                    })
                    .collect();
                request.body = body;
                let handle = bridge::retain(&ctx, callback)?;
                send(&r, handle, request);
                Ok(())
            },
        )?,
    )?;
    Ok(())
}

/// Run `request` off the script thread and schedule its completion
pub(crate) fn send(realm: &Realm, handle: JsHandle, request: XhrRequest) {
    tracing::debug!("xhr: {} {}", request.method, request.uri);
    let transport = realm.callbacks.xhr.clone();
    let scheduler = realm.scheduler.clone();
    smol::spawn(async move {
        let result: XhrResult = match transport {
            Some(transport) => smol::unblock(move || transport(request))
                .await
                .map_err(|err| format!("{err:#}")),
            None => Err("no HTTP transport".to_string()),
        };
        let task: Task = Box::new(move |host: &mut ScriptHost| {
            if let Err(err) = host.complete_xhr(handle, result) {
                tracing::warn!("xhr completion: {}", err);
            }
        });
        scheduler(task);
    })
    .detach();
}

/// Arguments of the script callback: `(data, error, status, headers)`
pub(crate) fn callback_args<'js>(ctx: &Ctx<'js>, result: &XhrResult) -> rquickjs::Result<Vec<Value<'js>>> {
    Ok(match result {
        Ok(response) => vec![
            bridge::string(ctx, &response.body)?,
            bridge::null(ctx),
            bridge::int(ctx, usize::from(response.status)),
            bridge::string(ctx, &response.header_block())?,
        ],
        Err(message) => vec![
            bridge::null(ctx),
            bridge::string(ctx, message)?,
            bridge::int(ctx, 0),
            bridge::string(ctx, "")?,
        ],
    })
}
