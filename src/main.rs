use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use image::GenericImageView;
use simplelog::TermLogger;
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

use converge::registry::{self, RegistryType, WindowsVersion};
use converge::{config, pe, programs, util, Bottle, BottleManager, WineRunner};

fn list_bottles(manager: &BottleManager) -> Result<(), converge::Error> {
    let bottles = manager.bottles()?;
    if bottles.is_empty() {
        println!("No bottles.");
        return Ok(());
    }

    let mut stdout = StandardStream::stdout(termcolor::ColorChoice::Always);

    let mut initialised_color = ColorSpec::new();
    initialised_color.set_fg(Some(Color::Green));

    let mut uninitialised_color = ColorSpec::new();
    uninitialised_color.set_fg(Some(Color::Red));

    for bottle in &bottles {
        if bottle.drive_c().is_dir() {
            stdout.set_color(&initialised_color).unwrap();
        } else {
            stdout.set_color(&uninitialised_color).unwrap();
        }

        println!("{}", bottle.name());
    }
    stdout.reset().unwrap();

    Ok(())
}

fn print_header(header: &str) {
    let mut stdout = StandardStream::stdout(termcolor::ColorChoice::Always);

    let mut header_spec = ColorSpec::new();
    header_spec.set_bold(true);
    header_spec.set_underline(true);

    stdout.set_color(&header_spec).unwrap();
    println!("{header}:");
    stdout.reset().unwrap();
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    subcommand: Option<Subcommands>,
}

#[derive(Subcommand)]
enum Subcommands {
    /// list bottles
    ListBottles,

    /// create a new bottle
    CreateBottle {
        /// name of the bottle to create
        name: String,

        /// run winecfg after creation
        #[arg(long)]
        configure: bool,
    },

    /// delete a bottle and all of its files
    DeleteBottle {
        /// bottle to delete
        bottle: Bottle,
    },

    /// show a bottle's environment overrides
    ListEnv {
        bottle: Bottle,
    },

    /// read one environment override
    GetEnv {
        bottle: Bottle,
        key: String,
    },

    /// persist an environment override
    SetEnv {
        bottle: Bottle,
        key: String,
        value: String,
    },

    /// read a registry value through wine
    RegGet {
        bottle: Bottle,
        /// registry key, e.g. HKCU\Software\Wine\Mac Driver
        key: String,
        /// value name
        name: String,
        #[arg(long, default_value = "string")]
        value_type: RegistryType,
    },

    /// write a registry value through wine
    RegSet {
        bottle: Bottle,
        key: String,
        name: String,
        value: String,
        #[arg(long, default_value = "string")]
        value_type: RegistryType,
    },

    /// show the bottle's Windows version and graphics settings
    Settings {
        bottle: Bottle,
    },

    /// set the Windows version the bottle reports
    SetWindowsVersion {
        bottle: Bottle,
        /// one of: 10, 8.1, 8, 7, vista, xp, 2000
        version: WindowsVersion,
    },

    /// set the Windows build number the bottle reports
    SetBuildNumber {
        bottle: Bottle,
        build: String,
    },

    /// toggle retina rendering for the bottle
    SetRetinaMode {
        bottle: Bottle,
        enabled: bool,
    },

    /// list executables installed in the bottle
    Programs {
        bottle: Bottle,
    },

    /// extract the embedded icon of a Windows executable
    Icon {
        executable: PathBuf,

        /// where to write the icon, defaults to the executable name with a
        /// png extension
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// run an executable inside a bottle
    Run {
        bottle: Bottle,

        /// unix path or C:\ path of the executable
        executable: String,

        args: Vec<String>,

        /// wait for the program to exit
        #[arg(long)]
        wait: bool,
    },

    /// open the wine configuration program
    Winecfg {
        bottle: Bottle,
    },

    /// open the registry editor
    Regedit {
        bottle: Bottle,
    },

    /// install the wine toolchain from a Game Porting Toolkit app bundle
    InstallWine {
        bundle: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    TermLogger::init(
        if cli.verbose {
            simplelog::LevelFilter::Info
        } else {
            simplelog::LevelFilter::Warn
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .unwrap();

    let manager = BottleManager::default();
    let runner = WineRunner::new(config::wine_binary());

    match cli.subcommand {
        Some(Subcommands::ListBottles) => list_bottles(&manager)?,

        Some(Subcommands::CreateBottle { name, configure }) => {
            let bottle = manager.create(&name)?;
            println!("Created bottle \"{}\"", bottle.name());
            if configure {
                runner.spawn(["winecfg"], Some(&bottle))?;
            }
        }

        Some(Subcommands::DeleteBottle { bottle }) => {
            let prompt = format!("Delete bottle \"{}\" and all of its files?", bottle.name());
            if Confirm::new().with_prompt(prompt).default(false).interact()? {
                manager.delete(&runner, bottle)?;
            }
        }

        Some(Subcommands::ListEnv { bottle }) => {
            let environment = bottle.environment();
            if environment.is_empty() {
                println!("No overrides.");
            } else {
                let mut pairs = environment
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>();
                pairs.sort();
                for pair in pairs {
                    println!("{pair}");
                }
            }
        }

        Some(Subcommands::GetEnv { bottle, key }) => match bottle.environment_variable(&key) {
            Some(value) => println!("{value}"),
            None => println!("{key} is not set"),
        },

        Some(Subcommands::SetEnv { bottle, key, value }) => {
            bottle.set_environment_variable(&key, &value)?;
        }

        Some(Subcommands::RegGet {
            bottle,
            key,
            name,
            value_type,
        }) => match registry::value(&runner, &bottle, &key, &name, value_type)? {
            Some(value) => println!("{value}"),
            None => println!("value not found"),
        },

        Some(Subcommands::RegSet {
            bottle,
            key,
            name,
            value,
            value_type,
        }) => registry::set_value(&runner, &bottle, &key, &name, &value, value_type)?,

        Some(Subcommands::Settings { bottle }) => {
            let version = registry::windows_version(&runner, &bottle)?
                .unwrap_or_else(|| "unknown".to_owned());
            let retina = registry::retina_mode(&runner, &bottle)?;
            println!("Windows version: {version}");
            println!("Retina mode: {}", if retina { "on" } else { "off" });
        }

        Some(Subcommands::SetWindowsVersion { bottle, version }) => {
            registry::set_windows_version(&runner, &bottle, version)?;
        }

        Some(Subcommands::SetBuildNumber { bottle, build }) => {
            registry::set_build_number(&runner, &bottle, &build)?;
        }

        Some(Subcommands::SetRetinaMode { bottle, enabled }) => {
            registry::set_retina_mode(&runner, &bottle, enabled)?;
        }

        Some(Subcommands::Programs { bottle }) => {
            let found = programs::installed_programs(&bottle);
            if found.is_empty() {
                println!("No programs.");
            }

            for program in found {
                let icon = fs::read(&program)
                    .ok()
                    .and_then(|data| pe::extract_icon(&data));
                let name = program.strip_prefix(bottle.drive_c()).unwrap_or(&program);
                match icon {
                    Some(image) => {
                        let (width, height) = image.dimensions();
                        println!("{} [{width}x{height} icon]", name.display());
                    }
                    None => println!("{}", name.display()),
                }
            }
        }

        Some(Subcommands::Icon { executable, output }) => {
            let data = fs::read(&executable)?;
            match pe::extract_icon(&data) {
                Some(image) => {
                    let output = output.unwrap_or_else(|| executable.with_extension("png"));
                    image.save(&output)?;
                    println!("Wrote {}", output.display());
                }
                None => println!("No embedded icon found."),
            }
        }

        Some(Subcommands::Run {
            bottle,
            executable,
            args,
            wait,
        }) => {
            let path = util::resolve_windows_path(&bottle, &executable)
                .unwrap_or_else(|| PathBuf::from(&executable));
            let process = programs::launch(&runner, &bottle, &path, &args)?;
            if wait {
                process.wait()?;
            } else {
                println!("Started {} (pid {})", path.display(), process.id());
            }
        }

        Some(Subcommands::Winecfg { bottle }) => {
            runner.spawn(["winecfg"], Some(&bottle))?;
        }

        Some(Subcommands::Regedit { bottle }) => {
            runner.spawn(["regedit"], Some(&bottle))?;
        }

        Some(Subcommands::InstallWine { bundle }) => {
            converge::install_wine(&bundle)?;
            println!("Wine installed.");
        }

        None => {
            if !converge::wine_installed() {
                println!("Wine is not installed, run `converge-cli install-wine <bundle>` first.");
                println!();
            }
            print_header("Bottles");
            list_bottles(&manager)?;
        }
    }

    Ok(())
}
