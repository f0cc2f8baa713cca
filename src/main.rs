// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use clap::{crate_version, Parser, Subcommand};
use micmix::audio::{self, Direction};
use micmix::clip::{self, ClipFormat, Volume};
use micmix::config;
use micmix::controller::{keyboard, Controller};
use micmix::soundboard::Soundboard;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Routes a microphone through a soundboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio input and output devices.
    Devices {
        /// The audio host to use, "default" or "mock".
        #[arg(long, default_value = "default")]
        host: String,
        /// Prints the devices as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Lists and verifies all sounds in the given config.
    Sounds {
        /// The path to the soundboard config.
        config_path: PathBuf,
    },
    /// Decodes a sound file and prints information about it.
    Decode {
        /// The sound file to decode.
        path: PathBuf,
        /// The volume in percent to decode at.
        #[arg(short, long, default_value_t = 80)]
        volume: u32,
        /// The sample rate to convert to.
        #[arg(short, long, default_value_t = 44100)]
        sample_rate: u32,
        /// The channel count to convert to.
        #[arg(short, long, default_value_t = 2)]
        channels: u16,
    },
    /// Start will route the microphone and read hotkeys from the keyboard.
    Start {
        /// The path to the soundboard config.
        config_path: PathBuf,
        /// Don't start routing until asked to.
        #[arg(long)]
        no_routing: bool,
    },
}

#[derive(Serialize)]
struct Devices {
    input: Vec<audio::DeviceInfo>,
    output: Vec<audio::DeviceInfo>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices { host, json } => {
            let host = audio::get_host(&host);
            let list = |direction| -> Result<Vec<audio::DeviceInfo>, audio::DeviceError> {
                Ok(audio::list_devices(host.as_ref(), direction)?
                    .iter()
                    .map(|device| device.info(direction))
                    .collect())
            };
            let devices = Devices {
                input: list(Direction::Input)?,
                output: list(Direction::Output)?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
                return Ok(());
            }

            if devices.input.is_empty() && devices.output.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Input devices:");
            for device in devices.input.iter() {
                println!("- {}", device);
            }
            println!("\nOutput devices:");
            for device in devices.output.iter() {
                println!("- {}", device);
            }
        }
        Commands::Sounds { config_path } => {
            let config = config::load(&config_path)?;
            let catalog = config.catalog()?;

            if catalog.is_empty() {
                println!("No sounds found in {}.", config_path.display());
                return Ok(());
            }

            let mut problems = 0;
            println!("Sounds (count: {}):", catalog.len());
            for sound in catalog.iter() {
                let keybind = sound.keybind.as_deref().unwrap_or("-");
                println!(
                    "- {} (volume: {}%, key: {}): {}",
                    sound.name,
                    sound.volume.percent(),
                    keybind,
                    sound.path.display()
                );

                if !sound.path.is_file() {
                    println!("  missing file");
                    problems += 1;
                } else if !clip::is_supported(&sound.path) {
                    println!("  unsupported format");
                    problems += 1;
                }
            }

            if problems > 0 {
                return Err(format!("{} sound(s) have problems", problems).into());
            }
        }
        Commands::Decode {
            path,
            volume,
            sample_rate,
            channels,
        } => {
            let volume = Volume::try_from(volume)?;
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            let clip = clip::decode(
                &name,
                &path,
                ClipFormat {
                    sample_rate,
                    channels,
                },
                volume,
            )?;

            println!("{}:", clip.name());
            println!("- source: {}", clip.source_format());
            println!("- decoded: {}", clip.format());
            println!("- frames: {}", clip.frames());
            println!("- duration: {:.3}s", clip.duration().as_secs_f64());
            println!("- peak: {}", clip.peak());
        }
        Commands::Start {
            config_path,
            no_routing,
        } => {
            let mut config = config::load(&config_path)?;
            let soundboard = Arc::new(Soundboard::from_config(&config)?);
            if !no_routing {
                soundboard.start_routing()?;
            }

            let mut controller =
                Controller::new(soundboard.clone(), Arc::new(keyboard::Driver::new()));
            if let Err(e) = controller.join().await {
                error!("Error waiting for controller: {}", e);
            }

            if soundboard.has_unsaved_changes() {
                if let Err(e) = soundboard.save_config(&mut config, &config_path) {
                    warn!(err = %e, "Unable to save volumes.");
                }
            }
        }
    }

    Ok(())
}
