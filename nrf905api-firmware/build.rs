//! Build script for nrf905api-firmware
//!
//! - Sets up linker search paths and scripts for the selected target
//! - Validates board.toml and generates the pin map override
//! - Stamps the build time (`SOURCE_DATE_EPOCH` wins for reproducible builds)

use std::collections::BTreeMap;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use nrf905api_hal::BoardPins;

/// Radio and LED pins that board.toml may move
const PIN_KEYS: &[&str] = &[
    "led",
    "address_match",
    "carrier_detect",
    "chip_enable",
    "data_ready",
    "power",
    "tx_enable",
    "cs",
];

const FLAG_KEYS: &[&str] = &["led_active_low", "carrier_detect_routed"];

/// SPI data pins are fixed by the peripheral wiring
const FIXED_KEYS: &[&str] = &["mosi", "miso", "sck"];

const MAX_HOSTNAME_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Rp2040,
    Stm32f0,
}

impl Target {
    fn detect() -> Self {
        let rp2040 = env::var_os("CARGO_FEATURE_RP2040").is_some();
        let stm32f0 = env::var_os("CARGO_FEATURE_STM32F0").is_some();
        match (rp2040, stm32f0) {
            (true, false) => Target::Rp2040,
            (false, true) => Target::Stm32f0,
            _ => fail(
                "Select exactly one target feature",
                &["Enable either `rp2040` or `stm32f0`".to_string()],
            ),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Target::Rp2040 => "rp2040",
            Target::Stm32f0 => "stm32f0",
        }
    }

    fn backend(self) -> &'static str {
        match self {
            Target::Rp2040 => "nrf905api_hal_rp2040",
            Target::Stm32f0 => "nrf905api_hal_stm32f0",
        }
    }

    fn gpio_count(self) -> i64 {
        match self {
            Target::Rp2040 => 30,
            Target::Stm32f0 => 32,
        }
    }

    /// Reference wiring, kept equal to the backend's `DEFAULT_PINS` by the
    /// assertion emitted into `board_config.rs`
    fn default_pins(self) -> BoardPins {
        match self {
            Target::Rp2040 => BoardPins {
                led: 25,
                address_match: 20,
                carrier_detect: 21,
                chip_enable: 22,
                data_ready: 26,
                power: 27,
                tx_enable: 28,
                mosi: 19,
                miso: 16,
                sck: 18,
                cs: 17,
                led_active_low: false,
                carrier_detect_routed: true,
            },
            // port * 16 + pin
            Target::Stm32f0 => BoardPins {
                led: 17,
                address_match: 0,
                carrier_detect: 1,
                chip_enable: 2,
                data_ready: 3,
                power: 9,
                tx_enable: 10,
                mosi: 7,
                miso: 6,
                sck: 5,
                cs: 4,
                led_active_low: true,
                carrier_detect_routed: false,
            },
        }
    }

    /// Pins the backend hands out as plain GPIO
    fn usable(self, pin: u8) -> bool {
        match self {
            Target::Rp2040 => pin < 30 && !matches!(pin, 16 | 18 | 19),
            Target::Stm32f0 => matches!(pin, 0..=4 | 9 | 10 | 17),
        }
    }
}

fn main() {
    let target = Target::detect();
    setup_linker(target);
    generate_board_config(target);
}

/// Set up linker search paths and scripts
fn setup_linker(target: Target) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // embassy-stm32 provides memory.x through its `memory-x` feature
    if target == Target::Rp2040 {
        let memory_x = include_bytes!("memory.x");
        let mut f = File::create(out_dir.join("memory.x")).unwrap();
        f.write_all(memory_x).unwrap();
        println!("cargo:rustc-link-search={}", out_dir.display());
    }

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    if target == Target::Rp2040 {
        println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    }
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate board.toml and write `board_config.rs` to OUT_DIR
///
/// A missing board.toml keeps the target's reference wiring.
fn generate_board_config(target: Target) {
    println!("cargo:rerun-if-changed=board.toml");

    let config_path = Path::new("board.toml");
    let config: toml::Table = if config_path.exists() {
        let content = match fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(e) => fail("Failed to read board.toml", &[e.to_string()]),
        };
        match toml::from_str(&content) {
            Ok(table) => table,
            Err(e) => fail(
                "Invalid TOML syntax in board.toml",
                &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
            ),
        }
    } else {
        toml::Table::new()
    };

    let overrides = pin_overrides(&config, target);
    let hostname = hostname(&config);

    let mut pins = target.default_pins();
    for (key, value) in &overrides {
        set_field(&mut pins, key, value);
    }
    if let Err(conflict) = pins.check(|pin| target.usable(pin)) {
        fail(
            &format!("Invalid [pins.{}] in board.toml", target.name()),
            &[conflict.to_string()],
        );
    }

    let fields: String = overrides
        .iter()
        .map(|(key, value)| format!("    {key}: {value},\n"))
        .collect();
    let reference = target.default_pins();
    let mut defaults: Vec<(&str, String)> = reference
        .lines()
        .iter()
        .map(|&(key, pin)| (key, pin.to_string()))
        .collect();
    defaults.push(("led_active_low", reference.led_active_low.to_string()));
    defaults.push((
        "carrier_detect_routed",
        reference.carrier_detect_routed.to_string(),
    ));
    let defaults: String = defaults
        .iter()
        .map(|(key, value)| {
            format!(
                "    && {}::DEFAULT_PINS.{key} == {value}\n",
                target.backend()
            )
        })
        .collect();
    let hostname = match hostname {
        Some(name) => format!("Some({name:?})"),
        None => "None".to_string(),
    };

    let generated = format!(
        "/// Pin map from board.toml over the target's reference wiring\n\
         pub const BOARD_PINS: nrf905api_hal::BoardPins = nrf905api_hal::BoardPins {{\n\
         {fields}    ..{backend}::DEFAULT_PINS\n\
         }};\n\n\
         /// Hostname from board.toml\n\
         pub const HOSTNAME: Option<&str> = {hostname};\n\n\
         /// Unix time of the build script run\n\
         pub const BUILD_TIMESTAMP: u64 = {timestamp};\n\n\
         const _: () = assert!(\n\
         true\n\
         {defaults});\n",
        backend = target.backend(),
        timestamp = build_timestamp(),
    );

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("board_config.rs"), generated).unwrap();

    if !overrides.is_empty() {
        println!(
            "cargo:warning=board.toml: {} pin override(s) for {}",
            overrides.len(),
            target.name()
        );
    }
}

fn build_timestamp() -> u64 {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    if let Some(epoch) = env::var("SOURCE_DATE_EPOCH").ok().and_then(|v| v.parse().ok()) {
        return epoch;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Validated `[pins.<target>]` entries as Rust field initializers
fn pin_overrides(config: &toml::Table, target: Target) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let Some(section) = config
        .get("pins")
        .and_then(|pins| pins.get(target.name()))
    else {
        return out;
    };
    let Some(section) = section.as_table() else {
        fail(
            "Invalid board.toml",
            &[format!("[pins.{}] must be a table", target.name())],
        );
    };

    let mut errors = Vec::new();

    for (key, value) in section {
        if FIXED_KEYS.contains(&key.as_str()) {
            errors.push(format!("{key}: SPI data pins cannot be moved"));
        } else if FLAG_KEYS.contains(&key.as_str()) {
            match value.as_bool() {
                Some(flag) => {
                    out.insert(key.clone(), flag.to_string());
                }
                None => errors.push(format!("{key}: expected true or false")),
            }
        } else if PIN_KEYS.contains(&key.as_str()) {
            match parse_pin(value, target) {
                Ok(pin) => {
                    out.insert(key.clone(), pin.to_string());
                }
                Err(e) => errors.push(format!("{key}: {e}")),
            }
        } else {
            errors.push(format!("{key}: unknown key"));
        }
    }

    if !errors.is_empty() {
        fail(&format!("Invalid [pins.{}] in board.toml", target.name()), &errors);
    }
    out
}

/// Apply one validated override
fn set_field(pins: &mut BoardPins, key: &str, value: &str) {
    let flag = value == "true";
    let pin = value.parse().unwrap_or(u8::MAX);
    match key {
        "led" => pins.led = pin,
        "address_match" => pins.address_match = pin,
        "carrier_detect" => pins.carrier_detect = pin,
        "chip_enable" => pins.chip_enable = pin,
        "data_ready" => pins.data_ready = pin,
        "power" => pins.power = pin,
        "tx_enable" => pins.tx_enable = pin,
        "cs" => pins.cs = pin,
        "led_active_low" => pins.led_active_low = flag,
        "carrier_detect_routed" => pins.carrier_detect_routed = flag,
        _ => {}
    }
}

/// A GPIO number, or on STM32F0 a pin name such as "PB1"
fn parse_pin(value: &toml::Value, target: Target) -> Result<i64, String> {
    let pin = match (value, target) {
        (toml::Value::Integer(n), _) => *n,
        (toml::Value::String(name), Target::Stm32f0) => parse_stm32_pin(name)?,
        _ => return Err("expected a pin number".to_string()),
    };
    if !(0..target.gpio_count()).contains(&pin) {
        return Err(format!(
            "pin {pin} out of range 0..{}",
            target.gpio_count()
        ));
    }
    Ok(pin)
}

fn parse_stm32_pin(name: &str) -> Result<i64, String> {
    let upper = name.to_ascii_uppercase();
    let rest = upper
        .strip_prefix('P')
        .ok_or_else(|| format!("'{name}' is not a pin name"))?;
    let mut chars = rest.chars();
    let base = match chars.next() {
        Some('A') => 0,
        Some('B') => 16,
        _ => return Err(format!("'{name}': only ports A and B exist")),
    };
    let pin: i64 = chars
        .as_str()
        .parse()
        .map_err(|_| format!("'{name}' is not a pin name"))?;
    if !(0..16).contains(&pin) {
        return Err(format!("'{name}': pin index must be 0-15"));
    }
    Ok(base + pin)
}

fn hostname(config: &toml::Table) -> Option<String> {
    let value = config.get("network")?.get("hostname")?;
    let Some(name) = value.as_str() else {
        fail("Invalid [network] in board.toml", &["hostname must be a string".to_string()]);
    };
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        fail(
            "Invalid [network] in board.toml",
            &[format!("hostname must be 1-{MAX_HOSTNAME_LEN} bytes")],
        );
    }
    Some(name.to_string())
}

/// Abort the build with a boxed message
fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<57}║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        format_error_lines(lines)
    );
}

/// Format error message lines with box drawing
fn format_error_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| {
            let truncated = if line.chars().count() > 62 {
                format!("{}...", line.chars().take(59).collect::<String>())
            } else {
                line.clone()
            };
            format!("║  • {:<62} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
