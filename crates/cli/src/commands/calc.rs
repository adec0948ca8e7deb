use clap::{Subcommand, ValueEnum};
use soldy_core::heating::{
    self, ClimateZone, InsulationLevel, InsulationQuality, RADIATOR_MODULE_OUTPUT_KCAL_H,
};
use soldy_core::LoadError;

use crate::commands::{CommandResult, EXIT_INVALID_INPUT};

#[derive(Debug, Subcommand)]
pub enum CalcMethod {
    #[command(about = "Area method for floor heating, result in W")]
    Area {
        #[arg(long, help = "Surface in m²")]
        m2: f64,
        #[arg(long, value_enum)]
        zone: Zone,
        #[arg(long, value_enum)]
        insulation: Quality,
    },
    #[command(about = "Volume method for radiators, result in kcal/h and element count")]
    Volume {
        #[arg(long)]
        length: f64,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
        #[arg(long, value_enum)]
        level: Level,
    },
    #[command(about = "Boiler power with the safety margin applied, result in kcal/h")]
    Boiler {
        #[arg(long, help = "Declared heat load in kcal/h")]
        kcal: f64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Zone {
    Norte,
    Centro,
    Sur,
}

impl From<Zone> for ClimateZone {
    fn from(zone: Zone) -> Self {
        match zone {
            Zone::Norte => Self::North,
            Zone::Centro => Self::Central,
            Zone::Sur => Self::South,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Quality {
    Buena,
    Regular,
    Mala,
}

impl From<Quality> for InsulationQuality {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Buena => Self::Good,
            Quality::Regular => Self::Average,
            Quality::Mala => Self::Poor,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Level {
    Alta,
    Media,
    Baja,
}

impl From<Level> for InsulationLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Alta => Self::High,
            Level::Media => Self::Medium,
            Level::Baja => Self::Low,
        }
    }
}

pub fn run(method: &CalcMethod) -> CommandResult {
    match calculate(method) {
        Ok(message) => CommandResult::success("calc", message),
        Err(error) => {
            CommandResult::failure("calc", "invalid_input", error.to_string(), EXIT_INVALID_INPUT)
        }
    }
}

fn calculate(method: &CalcMethod) -> Result<String, LoadError> {
    match *method {
        CalcMethod::Area { m2, zone, insulation } => {
            let (zone, insulation) = (ClimateZone::from(zone), InsulationQuality::from(insulation));
            let load = heating::area_load(m2, zone, insulation)?;
            Ok(format!(
                "area load: {load} ({m2} m², zona {}, aislación {})",
                zone.label(),
                insulation.label()
            ))
        }
        CalcMethod::Volume { length, width, height, level } => {
            let level = InsulationLevel::from(level);
            let load = heating::volume_load(length, width, height, level)?;
            let modules = heating::radiator_modules(load, RADIATOR_MODULE_OUTPUT_KCAL_H)?;
            Ok(format!(
                "volume load: {load} ({length} x {width} x {height} m, aislación {}); {modules} radiator elements",
                level.label()
            ))
        }
        CalcMethod::Boiler { kcal } => {
            let required = heating::boiler_required_power(kcal)?;
            Ok(format!("boiler power: {required} (declared {kcal} kcal/h)"))
        }
    }
}
