// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Capability reporting for the virtual device (QUERYCAP).

use clap::Parser;
use serde_json::json;

use codecshim::device::{CodecDevice, Config};
use codecshim::loopback::LoopbackCodec;

use crate::error::CliError;

#[derive(Parser, Debug)]
pub struct Args {}

pub fn execute(_args: Args, json_output: bool) -> Result<(), CliError> {
    let device = CodecDevice::open(LoopbackCodec::new(), Config::default())?;
    let caps = device.query_cap();

    if json_output {
        let value = json!({
            "driver": caps.driver,
            "card": caps.card,
            "bus_info": caps.bus_info,
            "capabilities": format!("{:#010x}", caps.capabilities),
            "mem2mem": caps.is_mem2mem(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).map_err(|e| CliError::General(e.to_string()))?
        );
    } else {
        println!("Driver       : {}", caps.driver);
        println!("Card         : {}", caps.card);
        println!("Bus info     : {}", caps.bus_info);
        println!("Capabilities : {:#010x}", caps.capabilities);
        println!("Mem2mem      : {}", if caps.is_mem2mem() { "yes" } else { "no" });
    }

    device.close()?;
    Ok(())
}
