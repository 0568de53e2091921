use std::io::Write;
use std::net::Ipv4Addr;
use std::time::Duration;

use camino::Utf8Path;
use chrono::{TimeZone, Utc};
use reqwest::Method;
use serde_json::{Value, json};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

use vicecity_api::config::{AppConfig, NanoleafConfig};
use vicecity_api::request::{HubRequest, PluginId};
use vicecity_api::scene::Scene;

use crate::changes::{ChangeBus, ChangeSource, drain};
use crate::gateway::{
    Gateway, GatewayCommand, GatewayEvent, Sender, drain_commands, drain_requests,
};
use crate::hub::scene::{StepReport, apply_step};
use crate::hub::{Hub, day_of_week, format_time};
use crate::plugin::Plugin;

const STEP: Duration = Duration::from_millis(200);

struct Harness {
    hub: Hub,
    gateway: UnboundedReceiver<GatewayCommand>,
    changes: ChangeBus,
    _events: UnboundedSender<GatewayEvent>,
    _requests: UnboundedSender<HubRequest>,
}

fn harness() -> Harness {
    let (gw, gateway) = Gateway::channel();
    let (events_tx, events) = mpsc::unbounded_channel();
    let (requests_tx, requests) = mpsc::unbounded_channel();
    let changes = ChangeBus::default();
    let hub = Hub::new(&AppConfig::default(), &gw, events, requests, changes.clone()).unwrap();
    Harness {
        hub,
        gateway,
        changes,
        _events: events_tx,
        _requests: requests_tx,
    }
}

/// Hub with a configured bridge that knows a dimmable "Lamp" (id 1, off)
fn with_lamp(now: Instant) -> Harness {
    let mut h = harness();
    h.hub.hue.start(now);
    h.hub.hue.set_bridge_username("user", now);
    h.hub.handle_gateway_event(
        GatewayEvent::ServiceFound {
            service_type: "_hue._tcp.local.".into(),
            address: Ipv4Addr::new(10, 0, 0, 2),
        },
        now,
    );
    h.hub.handle_gateway_event(
        GatewayEvent::JsonReply {
            status: 200,
            sender: Sender::Plugin(PluginId::Hue),
            body: json!({
                "1": {"name": "Lamp", "type": "Dimmable light", "state": {"on": false, "bri": 1}}
            }),
        },
        now,
    );
    drain_commands(&mut h.gateway);
    h
}

fn scenes(value: Value) -> Vec<Scene> {
    serde_json::from_value(value).unwrap()
}

fn scene_flags(changes: &[crate::changes::Change]) -> Vec<Value> {
    changes
        .iter()
        .filter(|change| change.source == ChangeSource::Hub && change.property == "isRunningScene")
        .map(|change| change.value.clone())
        .collect()
}

fn device_bodies(rx: &mut UnboundedReceiver<GatewayCommand>) -> Vec<Value> {
    drain_requests(rx)
        .into_iter()
        .filter(|req| req.sender == Sender::HueDevice(1))
        .map(|req| req.json_body())
        .collect()
}

#[test]
fn evening_scene_runs_in_order() {
    let now = Instant::now();
    let mut h = with_lamp(now);
    h.hub.set_scenes(scenes(json!([{
        "name": "Evening",
        "steps": [
            {"device": {"name": "Lamp", "class": "hue"}, "state": {"on": true, "brightness": 60.0}},
            {"device": {"name": "Lamp", "class": "hue"}, "state": {"on": false}}
        ]
    }])));
    let mut changes = h.changes.subscribe();

    h.hub.run_scene("Evening", now);
    assert!(h.hub.is_running_scene());
    assert_eq!(
        device_bodies(&mut h.gateway),
        vec![json!({"on": true}), json!({"on": true}), json!({"bri": 153})]
    );

    // the next step waits for the pause
    h.hub.poll(now + STEP / 2);
    assert!(device_bodies(&mut h.gateway).is_empty());

    h.hub.poll(now + STEP);
    assert_eq!(device_bodies(&mut h.gateway), vec![json!({"on": false})]);
    assert!(h.hub.is_running_scene());

    h.hub.poll(now + STEP * 2);
    assert!(!h.hub.is_running_scene());
    assert_eq!(scene_flags(&drain(&mut changes)), vec![json!(true), json!(false)]);
}

#[test]
fn unknown_scene_is_ignored() {
    let now = Instant::now();
    let mut h = with_lamp(now);
    let mut changes = h.changes.subscribe();

    h.hub.run_scene("Nope", now);
    h.hub.run_scene("", now);

    assert!(!h.hub.is_running_scene());
    assert!(scene_flags(&drain(&mut changes)).is_empty());
    assert!(device_bodies(&mut h.gateway).is_empty());
}

#[test]
fn scene_request_while_running_is_ignored() {
    let now = Instant::now();
    let mut h = with_lamp(now);
    h.hub.set_scenes(scenes(json!([
        {"name": "A", "steps": [{"device": {"name": "Lamp", "class": "hue"}, "state": {"on": true}}]},
        {"name": "B", "steps": [{"device": {"name": "Lamp", "class": "hue"}, "state": {"on": false}}]}
    ])));

    h.hub.handle_hub_request(HubRequest::RunScene("A".into()), now);
    h.hub.handle_hub_request(HubRequest::RunScene("B".into()), now);
    assert_eq!(device_bodies(&mut h.gateway), vec![json!({"on": true})]);
}

#[test]
fn scene_step_capability_mismatch_is_consumed() {
    let now = Instant::now();
    let mut h = with_lamp(now);

    let report = apply_step(
        &h.hub.hue,
        &mut h.hub.nanoleaf,
        "Test",
        1,
        &json!({
            "device": {"name": "Lamp", "class": "hue"},
            "state": {"colorTemperature": 3000, "speed": 3}
        }),
    );
    assert_eq!(
        report,
        Some(StepReport {
            mismatched: vec!["colorTemperature".into()],
            unsupported: vec!["speed".into()],
            ..StepReport::default()
        })
    );
    assert!(device_bodies(&mut h.gateway).is_empty());
}

#[test]
fn scene_step_rejected_value_is_not_applied() {
    let now = Instant::now();
    let mut h = with_lamp(now);

    let report = apply_step(
        &h.hub.hue,
        &mut h.hub.nanoleaf,
        "Test",
        1,
        &json!({
            "device": {"name": "Lamp", "class": "hue"},
            "state": {"on": true, "brightness": 150}
        }),
    );
    assert_eq!(
        report,
        Some(StepReport {
            applied: vec!["on".into()],
            invalid: vec!["brightness".into()],
            ..StepReport::default()
        })
    );
    assert_eq!(device_bodies(&mut h.gateway), vec![json!({"on": true})]);
}

/// Hub with a configured panel named "Panel" that reports itself off
fn with_panel(now: Instant) -> Harness {
    let mut h = harness();
    h.hub.nanoleaf.set_auth_token("tok", now);
    h.hub.handle_gateway_event(
        GatewayEvent::ServiceFound {
            service_type: "_nanoleafapi._tcp.local.".into(),
            address: Ipv4Addr::new(10, 0, 0, 3),
        },
        now,
    );
    h.hub.handle_gateway_event(
        GatewayEvent::JsonReply {
            status: 200,
            sender: Sender::Plugin(PluginId::Nanoleaf),
            body: json!({"name": "Panel", "state": {"on": {"value": false}}}),
        },
        now,
    );
    drain_commands(&mut h.gateway);
    h
}

#[test]
fn scene_step_drives_panel() {
    let now = Instant::now();
    let mut h = with_panel(now);
    let config = NanoleafConfig::default();

    let report = apply_step(
        &h.hub.hue,
        &mut h.hub.nanoleaf,
        "Test",
        1,
        &json!({
            "device": {"name": "Panel", "class": "nanoleaf"},
            "state": {"on": true, "effect": "Aurora"}
        }),
    );
    assert_eq!(
        report,
        Some(StepReport {
            applied: vec!["on".into(), "effect".into()],
            ..StepReport::default()
        })
    );

    let reqs = drain_requests(&mut h.gateway);
    assert_eq!(reqs.len(), 2);
    assert!(reqs.iter().all(|req| req.method == Method::PUT));
    assert_eq!(reqs[0].url.as_str(), "http://10.0.0.3:16021/api/v1/tok/state");
    assert_eq!(reqs[0].json_body(), json!({"on": {"value": true}}));
    assert_eq!(reqs[1].url.as_str(), "http://10.0.0.3:16021/api/v1/tok/effects");
    assert_eq!(reqs[1].json_body(), json!({"select": "Aurora"}));

    // optimistic state until the panel confirms
    assert!(h.hub.nanoleaf.is_on());
    assert_eq!(h.hub.nanoleaf.selected_effect(), "Aurora");

    // a disagreeing report re-sends both commands after the confirm delay
    h.hub.handle_gateway_event(
        GatewayEvent::JsonReply {
            status: 200,
            sender: Sender::Plugin(PluginId::Nanoleaf),
            body: json!({"state": {"on": {"value": false}}, "effects": {"select": "Flames"}}),
        },
        now,
    );
    assert!(h.hub.nanoleaf.is_on());
    h.hub.poll(now + config.confirm_delay());

    let bodies: Vec<_> = drain_requests(&mut h.gateway)
        .iter()
        .map(|req| req.json_body())
        .collect();
    assert_eq!(
        bodies,
        vec![json!({"on": {"value": true}}), json!({"select": "Aurora"})]
    );
}

#[test]
fn scene_step_with_unknown_device_is_skipped() {
    let now = Instant::now();
    let mut h = with_lamp(now);

    for step in [
        json!({"device": {"name": "Ghost", "class": "hue"}, "state": {"on": true}}),
        json!({"device": {"name": "Lamp", "class": "toaster"}, "state": {"on": true}}),
        json!({"device": {"name": "Panel", "class": "nanoleaf"}, "state": {"on": true}}),
        json!({"state": {"on": true}}),
    ] {
        assert_eq!(apply_step(&h.hub.hue, &mut h.hub.nanoleaf, "Test", 1, &step), None);
    }
    assert!(drain_commands(&mut h.gateway).is_empty());
}

#[test]
fn scene_colors_come_from_scenes() {
    let mut h = harness();
    h.hub.set_scenes(scenes(json!([{
        "name": "Red",
        "steps": [{"device": {"name": "Strip", "class": "hue"}, "state": {"hue": 0}}]
    }])));
    assert_eq!(h.hub.scene_colors("Red"), vec!["#ff0000"]);
    assert!(h.hub.scene_colors("Blue").is_empty());
}

#[test]
fn set_active_reaches_every_plugin() {
    let now = Instant::now();
    let mut h = harness();
    let mut changes = h.changes.subscribe();

    h.hub.handle_hub_request(HubRequest::SetActive(false), now);
    assert!(!h.hub.is_active());
    for id in PluginId::ALL {
        assert!(!h.hub.plugin(id).base().is_active(), "{id} still active");
    }

    let changes = drain(&mut changes);
    assert_eq!(changes[0].source, ChangeSource::Hub);
    assert_eq!(changes[0].property, "isActive");
    assert_eq!(changes[0].value, json!(false));

    // repeats are not notified
    let mut changes = h.changes.subscribe();
    h.hub.set_active(false, now);
    assert!(drain(&mut changes).is_empty());
}

#[test]
fn host_resolution_routed_by_sender() {
    let now = Instant::now();
    let mut h = harness();
    h.hub.pihole.set_server_hostname("pi.hole");
    drain_commands(&mut h.gateway);

    h.hub.handle_gateway_event(
        GatewayEvent::HostResolved {
            sender: Sender::Plugin(PluginId::PiHole),
            hostname: "pi.hole".into(),
            address: Some(Ipv4Addr::new(10, 0, 0, 5)),
        },
        now,
    );

    let reqs = drain_requests(&mut h.gateway);
    assert!(!reqs.is_empty());
    for req in reqs {
        assert_eq!(req.sender, Sender::Plugin(PluginId::PiHole));
        assert_eq!(req.url.host_str(), Some("10.0.0.5"));
    }
}

#[test]
fn replies_routed_by_sender() {
    let now = Instant::now();
    let mut h = harness();

    h.hub.handle_gateway_event(
        GatewayEvent::JsonReply {
            status: 200,
            sender: Sender::Plugin(PluginId::Facts),
            body: json!({"text": "Honey never spoils."}),
        },
        now,
    );
    assert_eq!(h.hub.facts.fact(), "Honey never spoils.");
    assert_eq!(h.hub.insults.insult(), "");
}

#[test]
fn time_formatting() {
    let time = Utc.with_ymd_and_hms(2024, 1, 5, 13, 7, 0).unwrap();
    assert_eq!(format_time(&time, true), "13:07");
    assert_eq!(format_time(&time, false), "1:07 PM");
    assert_eq!(day_of_week(&time), "Friday");
}

#[test]
fn settings_load_and_save() {
    let now = Instant::now();
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8Path::from_path(dir.path()).unwrap().join("settings.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        "{}",
        json!({
            "Hub.use24HourClock": true,
            "Hub.homeMap": "map.svg",
            "Weather.latitude": 42.5,
            "Weather.longitude": "north",
            "Facts.updateInterval": 120_000,
            "Unknown.key": 1
        })
    )
    .unwrap();
    drop(file);

    let mut h = harness();
    h.hub.load_settings(&path, now).unwrap();

    assert!(h.hub.use_24_hour_clock());
    assert_eq!(h.hub.weather.latitude(), Some(42.5));
    assert_eq!(h.hub.weather.longitude(), None);
    assert_eq!(
        h.hub.plugin(PluginId::Facts).base().update_interval(),
        Duration::from_secs(120)
    );
    assert_eq!(h.hub.home_map(), "map.svg");
    assert_eq!(
        h.hub.home_map_path(),
        Some(path.parent().unwrap().join("map.svg").as_path())
    );

    // nothing changed yet, so the file is untouched
    let before = std::fs::read_to_string(&path).unwrap();
    h.hub.autosave();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

    // untracked settings never trigger a save
    h.hub.set_darker_background(true);
    h.hub.autosave();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

    h.hub.handle_hub_request(HubRequest::SetUse24HourClock(false), now);
    h.hub.autosave();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["Hub.use24HourClock"], json!(false));
    assert_eq!(saved["Weather.latitude"], json!(42.5));
    assert_eq!(saved["Facts.updateInterval"], json!(120_000));
    assert_eq!(saved["Weather.longitude"], json!("north"));
    assert_eq!(saved["Unknown.key"], json!(1));
    assert!(saved.get("Hub.darkerBackground").is_none());
}

#[test]
fn settings_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8Path::from_path(dir.path()).unwrap().join("missing.json");
    let mut h = harness();
    assert!(h.hub.load_settings(&path, Instant::now()).is_err());
}
