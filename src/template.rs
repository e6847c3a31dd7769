use crate::{
    channel::Channel,
    configuration::main_configuration::{self, ConfigField, GlobalConfig, IntervalUnit},
    device::Reading,
};

const BASE_HTML: &str = include_str!("html/base.html");
const SETTINGS_FORM_HTML: &str = include_str!("html/form_hygrometer.html");

const REFRESH_META: &str = r#"<meta http-equiv="refresh" content="10">"#;

pub fn to_html(config: &GlobalConfig, readings: &[Reading], message: Option<&str>) -> String {
    let mut template = BASE_HTML.to_string();

    template = template.replace("{FORM_SETTINGS}", SETTINGS_FORM_HTML);
    template = template.replace("{ERROR_MSG}", &escape(message.unwrap_or("")));
    template = template.replace("{READINGS}", &readings_to_template(readings));
    template = template.replace(
        "{REFRESH}",
        if config.auto_refresh { REFRESH_META } else { "" },
    );

    for elem in main_configuration::MAP_NVS_FORM {
        let value = match elem.field {
            ConfigField::IntervalUnit => interval_unit_options(config.scan_interval.unit),
            ConfigField::ReferenceChannel => reference_channel_options(config.reference_channel),
            field => escape(&config.form_value(field)),
        };

        template = template.replace(elem.template_id, &value);
    }

    template
}

fn escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => result += "&amp;",
            '<' => result += "&lt;",
            '>' => result += "&gt;",
            '"' => result += "&quot;",
            '\'' => result += "&#39;",
            c => result.push(c),
        }
    }

    result
}

fn option(value: &str, label: &str, selected: bool) -> String {
    format!(
        "<option value=\"{}\"{}>{}</option>",
        value,
        if selected { " selected" } else { "" },
        label
    )
}

fn interval_unit_options(current: IntervalUnit) -> String {
    [
        (IntervalUnit::Seconds, "seconds"),
        (IntervalUnit::Minutes, "minutes"),
    ]
    .iter()
    .map(|(unit, label)| option(unit.form_value(), label, *unit == current))
    .collect()
}

fn reference_channel_options(current: Option<Channel>) -> String {
    let mut result = option("none", "none", current.is_none());

    for channel in Channel::all() {
        result += &option(
            &channel.to_string(),
            &format!("CH{}", channel),
            current == Some(channel),
        );
    }

    result
}

fn readings_to_template(readings: &[Reading]) -> String {
    let mut result = String::new();

    for reading in readings {
        result += &format!(
            "<tr><td>CH{}</td><td>{:.0}</td><td>{:.0}</td><td>{:.0}</td><td>{:.1} %</td></tr>",
            reading.channel,
            reading.resistance,
            reading.limits.dry,
            reading.limits.wet,
            reading.index
        );
    }

    result
}
