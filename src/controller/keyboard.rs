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
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::audio::DeviceId;

const PLAY: &str = "play";
const STOP: &str = "stop";
const VOLUME: &str = "volume";
const ROUTE: &str = "route";
const INPUT: &str = "input";
const OUTPUT: &str = "output";
const DEVICES: &str = "devices";
const STATUS: &str = "status";
const QUIT: &str = "quit";

/// A controller that controls a soundboard using the keyboard. A line with a
/// single word that isn't a command plays the sound bound to that key.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and sends a single command. Returns false once the driver should stop.
    fn monitor_io<R, W>(events_tx: &Sender<Event>, mut reader: R, mut writer: W) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command (<key>, {} <name>, {}, {} <name> <percent>, {} on|off, {} <id>, {} <id>, {}, {}, {}): ",
            PLAY, STOP, VOLUME, ROUTE, INPUT, OUTPUT, DEVICES, STATUS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            // EOF
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let event = match parse(&input) {
            Some(event) => event,
            None => {
                if !input.trim().is_empty() {
                    warn!(input = input.trim(), "Unrecognized input");
                }
                return Ok(true);
            }
        };
        let quit = event == Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(!quit)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

fn parse(input: &str) -> Option<Event> {
    let input = input.trim();
    let (command, argument) = match input.split_once(char::is_whitespace) {
        Some((command, argument)) => (command.to_lowercase(), argument.trim()),
        None => (input.to_lowercase(), ""),
    };

    match (command.as_str(), argument) {
        ("", _) => None,
        (PLAY, "") => None,
        (PLAY, name) => Some(Event::Play(name.to_string())),
        (VOLUME, argument) => {
            let (name, percent) = argument.rsplit_once(char::is_whitespace)?;
            let percent = percent.parse::<u32>().ok()?;
            Some(Event::Volume(name.trim().to_string(), percent))
        }
        (ROUTE, state) => match state.to_lowercase().as_str() {
            "on" => Some(Event::Routing(true)),
            "off" => Some(Event::Routing(false)),
            _ => None,
        },
        (INPUT, id) => id.parse::<DeviceId>().ok().map(Event::SelectInput),
        (OUTPUT, id) => id.parse::<DeviceId>().ok().map(Event::SelectOutput),
        (STOP, "") => Some(Event::StopAll),
        (DEVICES, "") => Some(Event::Devices),
        (STATUS, "") => Some(Event::Status),
        (QUIT, "") => Some(Event::Quit),
        (_, "") => Some(Event::PlayKey(input.to_string())),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}
