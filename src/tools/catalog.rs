//! Built-in Termux:API capability catalogue
//!
//! One definition per remote command family. Options that make the device
//! run an arbitrary shell command (notification `--action`, `termux-usb -e`,
//! button actions) are deliberately not exposed.

use crate::errors::Result;
use crate::tools::types::{CapabilityDefinition, ParamKind, ParamSpec, ResultShape};
use serde_json::json;
use std::time::Duration;

use ParamKind::{Boolean, PhoneList, Url};
use ResultShape::{ListOfRecords, RawText, StructuredKv};

fn def(name: &str, description: &str, template: &str, shape: ResultShape) -> Result<CapabilityDefinition> {
    CapabilityDefinition::new(name, description, template, shape)
}

fn req(name: &str, kind: ParamKind, description: &str) -> ParamSpec {
    ParamSpec::required(name, kind, description)
}

fn opt(name: &str, kind: ParamKind, description: &str) -> ParamSpec {
    ParamSpec::optional(name, kind, description)
}

fn int(min: i64, max: i64) -> ParamKind {
    ParamKind::integer(min, max)
}

fn text(max_len: usize) -> ParamKind {
    ParamKind::text(max_len)
}

fn choice(options: &[&str]) -> ParamKind {
    ParamKind::choice(options)
}

fn path() -> ParamKind {
    ParamKind::path()
}

/// All built-in capability definitions
pub fn builtin_capabilities() -> Result<Vec<CapabilityDefinition>> {
    let mut all = Vec::new();
    all.extend(device_status()?);
    all.extend(messaging()?);
    all.extend(media()?);
    all.extend(interaction()?);
    all.extend(connectivity()?);
    Ok(all)
}

fn device_status() -> Result<Vec<CapabilityDefinition>> {
    Ok(vec![
        def("battery-status", "Get battery status", "termux-battery-status", StructuredKv)?,
        def(
            "get-battery-status",
            "Get battery level and charging status",
            "termux-battery-status",
            StructuredKv,
        )?,
        def(
            "brightness",
            "Set screen brightness (0-255 or auto)",
            "termux-brightness {brightness}",
            RawText,
        )?
        .param(req(
            "brightness",
            ParamKind::IntegerOrKeyword {
                min: 0,
                max: 255,
                keywords: vec!["auto".to_string()],
            },
            "Brightness level 0-255, or \"auto\"",
        ))
        .with_ack("Brightness set"),
        def("camera-info", "Get information about device cameras", "termux-camera-info", ListOfRecords)?,
        def("fingerprint", "Authenticate with the fingerprint sensor", "termux-fingerprint", StructuredKv)?
            .with_timeout(Duration::from_secs(60)),
        def(
            "location",
            "Get the device location",
            "termux-location [-p {provider}] [-r {request}]",
            StructuredKv,
        )?
        .param(opt("provider", choice(&["gps", "network", "passive"]), "Location provider").with_default(json!("gps")))
        .param(opt("request", choice(&["once", "last"]), "Request kind").with_default(json!("once")))
        .with_timeout(Duration::from_secs(60)),
        def("sensor-list", "List available sensors", "termux-sensor -l", StructuredKv)?,
        def(
            "sensor-read",
            "Read values from one or more sensors",
            "termux-sensor -s {sensors} [-d {delay}] -n {limit}",
            StructuredKv,
        )?
        .param(req("sensors", text(512), "Comma-separated sensor names (partial matches allowed)"))
        .param(opt("delay", int(0, 60_000), "Delay between readings in milliseconds"))
        .param(opt("limit", int(1, 100), "Number of readings").with_default(json!(1)))
        .with_timeout(Duration::from_secs(60)),
        def("sensor-cleanup", "Release sensor resources", "termux-sensor -c", RawText)?
            .with_ack("Sensor resources released"),
        def(
            "telephony-cellinfo",
            "Get information about all observed cell towers",
            "termux-telephony-cellinfo",
            ListOfRecords,
        )?,
        def(
            "telephony-deviceinfo",
            "Get telephony device information",
            "termux-telephony-deviceinfo",
            StructuredKv,
        )?,
        def("torch", "Toggle the LED torch", "termux-torch {state}", RawText)?
            .param(req("state", choice(&["on", "off"]), "Torch state"))
            .with_ack("Torch toggled"),
        def(
            "vibrate",
            "Vibrate the device",
            "termux-vibrate [-d {duration}] [-f {force}]",
            RawText,
        )?
        .param(opt("duration", int(1, 10_000), "Duration in milliseconds").with_default(json!(1000)))
        .param(opt("force", Boolean, "Vibrate even in silent mode"))
        .with_ack("Vibration triggered"),
        def("volume-get", "Get volume of all audio streams", "termux-volume", ListOfRecords)?,
        def("volume-set", "Set the volume of an audio stream", "termux-volume {stream} {volume}", RawText)?
            .param(req(
                "stream",
                choice(&["alarm", "music", "notification", "ring", "system", "call"]),
                "Audio stream",
            ))
            .param(req("volume", int(0, 100), "Volume level"))
            .with_ack("Volume set"),
        def(
            "wallpaper",
            "Change the device wallpaper from a file or URL",
            "termux-wallpaper [-f {file}] [-u {url}] [-l {lockscreen}]",
            RawText,
        )?
        .param(opt("file", path(), "Image file on the device"))
        .param(opt("url", Url, "Image URL"))
        .param(opt("lockscreen", Boolean, "Set the lockscreen wallpaper"))
        .exactly_one_of(&["file", "url"])
        .with_ack("Wallpaper set"),
    ])
}

fn messaging() -> Result<Vec<CapabilityDefinition>> {
    Ok(vec![
        def(
            "call-log",
            "List call history",
            "termux-call-log [-l {limit}] [-o {offset}]",
            ListOfRecords,
        )?
        .param(opt("limit", int(1, 1000), "Number of entries").with_default(json!(10)))
        .param(opt("offset", int(0, 100_000), "Offset into the log").with_default(json!(0)))
        .empty_on_non_zero(),
        def("contact-list", "List all contacts", "termux-contact-list", ListOfRecords)?.empty_on_non_zero(),
        def(
            "sms-list",
            "List SMS messages",
            "termux-sms-list [-d {show_dates}] [-l {limit}] [-n {show_numbers}] [-o {offset}] [-t {type}]",
            ListOfRecords,
        )?
        .param(opt("limit", int(1, 1000), "Number of messages").with_default(json!(10)))
        .param(opt("offset", int(0, 100_000), "Offset into the list").with_default(json!(0)))
        .param(opt("show_dates", Boolean, "Show dates when messages were created"))
        .param(opt("show_numbers", Boolean, "Show phone numbers"))
        .param(
            opt("type", choice(&["all", "inbox", "sent", "draft", "outbox"]), "Message box")
                .with_default(json!("inbox")),
        )
        .empty_on_non_zero(),
        def(
            "sms-send",
            "Send an SMS message",
            "termux-sms-send -n {numbers} [-s {slot}] {text}",
            RawText,
        )?
        .param(req("numbers", PhoneList, "Recipient number(s), comma-separated"))
        .param(req("text", text(1600), "Message body"))
        .param(opt("slot", int(0, 3), "SIM slot"))
        .with_ack("SMS sent"),
        def("send-message", "Send an SMS message", "termux-sms-send -n {to} {body}", RawText)?
            .param(req("to", PhoneList, "Recipient number(s), comma-separated"))
            .param(req("body", text(1600), "Message body"))
            .with_ack("SMS sent"),
        def("telephony-call", "Call a phone number", "termux-telephony-call {number}", RawText)?
            .param(req("number", PhoneList, "Number to call"))
            .with_ack("Calling"),
        def(
            "notification",
            "Display a system notification",
            "termux-notification [--id {id}] [--title {title}] [--content {content}] \
             [--alert-once {alert_once}] [--group {group}] [--image-path {image_path}] \
             [--led-color {led_color}] [--led-on {led_on}] [--led-off {led_off}] \
             [--ongoing {ongoing}] [--priority {priority}] [--sound {sound}] \
             [--vibrate {vibrate}] [--type {type}]",
            RawText,
        )?
        .param(opt("content", text(4096), "Notification body"))
        .param(opt("title", text(256), "Notification title"))
        .param(opt("id", text(64), "Notification id, reused to update or remove it"))
        .param(opt("alert_once", Boolean, "Do not alert when the notification is edited"))
        .param(opt("group", text(64), "Notification group"))
        .param(opt("image_path", path(), "Image to show in the notification"))
        .param(opt("led_color", text(8), "LED color as RRGGBB"))
        .param(opt("led_on", int(0, 60_000), "LED on time in milliseconds"))
        .param(opt("led_off", int(0, 60_000), "LED off time in milliseconds"))
        .param(opt("ongoing", Boolean, "Pin the notification"))
        .param(opt("priority", choice(&["high", "low", "max", "min", "default"]), "Priority"))
        .param(opt("sound", Boolean, "Play a sound"))
        .param(opt("vibrate", ParamKind::IntList { max_items: 16 }, "Vibration pattern in milliseconds"))
        .param(opt("type", choice(&["default", "media"]), "Notification style"))
        .with_ack("Notification shown"),
        def(
            "notification-remove",
            "Remove a previously shown notification",
            "termux-notification-remove {id}",
            RawText,
        )?
        .param(req("id", text(64), "Notification id"))
        .with_ack("Notification removed"),
    ])
}

fn media() -> Result<Vec<CapabilityDefinition>> {
    Ok(vec![
        def(
            "camera-photo",
            "Take a photo and save it as JPEG",
            "termux-camera-photo [-c {camera_id}] {output_file}",
            RawText,
        )?
        .param(req("output_file", path(), "Output JPEG path on the device"))
        .param(opt("camera_id", int(0, 16), "Camera id"))
        .with_timeout(Duration::from_secs(30))
        .with_ack("Photo saved"),
        def(
            "media-player",
            "Play a media file or control playback",
            "termux-media-player {command} [{file}]",
            RawText,
        )?
        .param(req("command", choice(&["info", "play", "pause", "stop"]), "Player command"))
        .param(opt("file", path(), "File to play"))
        .with_ack("Media player command sent"),
        def(
            "media-scan",
            "Scan files into the media content provider",
            "termux-media-scan [-r {recursive}] [-v {verbose}] {files}",
            RawText,
        )?
        .param(req("files", ParamKind::PathList { max_items: 64 }, "Files or directories"))
        .param(opt("recursive", Boolean, "Scan directories recursively"))
        .param(opt("verbose", Boolean, "Verbose output"))
        .with_ack("Media scan complete"),
        def(
            "microphone-record-start",
            "Start recording from the microphone",
            "termux-microphone-record -d [-f {file}] [-l {limit}] [-e {encoder}] [-b {bitrate}] \
             [-r {rate}] [-c {channels}]",
            RawText,
        )?
        .param(opt("file", path(), "Output file"))
        .param(opt("limit", int(0, 86_400), "Recording limit in seconds (0 = unlimited)"))
        .param(opt("encoder", choice(&["aac", "amr_wb", "amr_nb", "opus"]), "Encoder"))
        .param(opt("bitrate", int(1, 512), "Bitrate in kbps"))
        .param(opt("rate", int(8_000, 192_000), "Sampling rate in Hz"))
        .param(opt("channels", int(1, 2), "Channel count"))
        .with_ack("Recording started"),
        def(
            "microphone-record-info",
            "Get information about the current recording",
            "termux-microphone-record -i",
            StructuredKv,
        )?,
        def("microphone-record-stop", "Stop the current recording", "termux-microphone-record -q", RawText)?
            .with_ack("Recording stopped"),
        def(
            "storage-get",
            "Request a file from the system file picker",
            "termux-storage-get {output_file}",
            RawText,
        )?
        .param(req("output_file", path(), "Destination path on the device"))
        .with_timeout(Duration::from_secs(120))
        .with_ack("File saved"),
        def(
            "share",
            "Share a file through the Android share sheet",
            "termux-share [-a {action}] [-c {content_type}] [-d {default_receiver}] [-t {title}] {file}",
            RawText,
        )?
        .param(req("file", path(), "File to share"))
        .param(opt("action", choice(&["edit", "send", "view"]), "Share action"))
        .param(opt("content_type", text(128), "MIME type"))
        .param(opt("default_receiver", Boolean, "Share to the default receiver"))
        .param(opt("title", text(256), "Share title"))
        .with_ack("Content shared"),
    ])
}

fn interaction() -> Result<Vec<CapabilityDefinition>> {
    Ok(vec![
        def("clipboard-get", "Get the system clipboard text", "termux-clipboard-get", RawText)?,
        def("clipboard-set", "Set the system clipboard text", "termux-clipboard-set {text}", RawText)?
            .param(req("text", text(65_536), "Clipboard text"))
            .with_ack("Clipboard set"),
        def(
            "dialog",
            "Show a dialog widget and return the user's input",
            "termux-dialog {widget} [-t {title}] [-i {hint}] [-v {values}] [-r {range}] \
             [-m {multiple}] [-n {number}] [-p {password}] [-d {date_format}]",
            StructuredKv,
        )?
        .param(
            opt(
                "widget",
                choice(&[
                    "confirm", "checkbox", "counter", "date", "radio", "sheet", "spinner",
                    "speech", "text", "time",
                ]),
                "Widget type",
            )
            .with_default(json!("text")),
        )
        .param(opt("title", text(256), "Dialog title"))
        .param(opt("hint", text(256), "Input hint"))
        .param(opt("values", text(2048), "Comma-separated values for list widgets"))
        .param(opt("range", ParamKind::IntList { max_items: 3 }, "min,max,start for counter"))
        .param(opt("multiple", Boolean, "Multi-line text input"))
        .param(opt("number", Boolean, "Numeric text input"))
        .param(opt("password", Boolean, "Password text input"))
        .param(opt("date_format", text(64), "Date format for the date widget"))
        .with_timeout(Duration::from_secs(120)),
        def(
            "download",
            "Download a resource with the system download manager",
            "termux-download [-t {title}] [-d {description}] [-p {path}] {url}",
            RawText,
        )?
        .param(req("url", Url, "Resource URL"))
        .param(opt("title", text(256), "Download title"))
        .param(opt("description", text(1024), "Download description"))
        .param(opt("path", path(), "Destination path"))
        .with_ack("Download started"),
        def(
            "infrared-frequencies",
            "Query the infrared transmitter's supported carrier frequencies",
            "termux-infrared-frequencies",
            RawText,
        )?,
        def(
            "infrared-transmit",
            "Transmit an infrared pattern",
            "termux-infrared-transmit -f {frequency} {pattern}",
            RawText,
        )?
        .param(req("frequency", int(1, 100_000_000), "Carrier frequency in Hz"))
        .param(req("pattern", ParamKind::IntList { max_items: 512 }, "On/off pattern in microseconds"))
        .with_ack("Infrared pattern transmitted"),
        def(
            "toast",
            "Show a transient popup notification",
            "termux-toast [-b {background}] [-c {color}] [-g {position}] [-s {short}] {text}",
            RawText,
        )?
        .param(req("text", text(1024), "Toast text"))
        .param(opt("background", text(16), "Background color"))
        .param(opt("color", text(16), "Text color"))
        .param(opt("position", choice(&["top", "middle", "bottom"]), "Position"))
        .param(opt("short", Boolean, "Show for a short duration"))
        .with_ack("Toast shown"),
        def("tts-engines", "List available text-to-speech engines", "termux-tts-engines", ListOfRecords)?,
        def(
            "tts-speak",
            "Speak text with the system text-to-speech engine",
            "termux-tts-speak [-e {engine}] [-l {language}] [-n {region}] [-v {variant}] \
             [-p {pitch}] [-r {rate}] [-s {stream}] {text}",
            RawText,
        )?
        .param(req("text", text(4096), "Text to speak"))
        .param(opt("engine", text(128), "TTS engine"))
        .param(opt("language", text(16), "Language"))
        .param(opt("region", text(16), "Region"))
        .param(opt("variant", text(32), "Variant"))
        .param(opt("pitch", ParamKind::Float { min: 0.1, max: 4.0 }, "Pitch multiplier"))
        .param(opt("rate", ParamKind::Float { min: 0.1, max: 4.0 }, "Speech rate multiplier"))
        .param(opt(
            "stream",
            choice(&["ALARM", "MUSIC", "NOTIFICATION", "RING", "SYSTEM", "VOICE_CALL"]),
            "Audio stream",
        ))
        .with_timeout(Duration::from_secs(120))
        .with_ack("Speech started"),
    ])
}

fn connectivity() -> Result<Vec<CapabilityDefinition>> {
    Ok(vec![
        def("usb-list", "List connected USB devices", "termux-usb -l", RawText)?,
        def(
            "usb-access",
            "Request permission to access a USB device",
            "termux-usb [-r {request}] {device}",
            RawText,
        )?
        .param(req("device", path(), "Device path from usb-list"))
        .param(opt("request", Boolean, "Show the permission request dialog"))
        .with_ack("USB access granted"),
        def(
            "wifi-connectioninfo",
            "Get current Wi-Fi connection information",
            "termux-wifi-connectioninfo",
            StructuredKv,
        )?,
        def("wifi-enable", "Enable or disable Wi-Fi", "termux-wifi-enable {state}", RawText)?
            .param(req("state", Boolean, "true to enable, false to disable"))
            .with_ack("Wi-Fi state changed"),
        def("wifi-scaninfo", "Get the last Wi-Fi scan results", "termux-wifi-scaninfo", ListOfRecords)?,
    ])
}
