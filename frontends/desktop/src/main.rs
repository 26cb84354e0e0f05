use clap::Parser;
use eframe::egui;
use egui::IconData;
use pv8_core::display::DrawOptions;
use pv8_core::pixel_data::Rect;
use pv8_core::{Console, ConsoleConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(version, about = "Viewer for Pixel Vision 8 style game data.", long_about = None)]
struct Args {
    /// Game data JSON (palette, sprites, tilemap, fonts).
    #[arg(name = "GAME_PATH")]
    game_path: Option<PathBuf>,

    /// TOML file with console hardware settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone)]
struct DisplayLogEntry {
    frame: u64,
    level: log::Level,
    target: String,
    message: String,
}

impl From<pv8_core::log_buffer::LogEntry> for DisplayLogEntry {
    fn from(entry: pv8_core::log_buffer::LogEntry) -> Self {
        Self {
            frame: entry.frame,
            level: entry.level,
            target: entry.target,
            message: entry.message,
        }
    }
}

// Viewer settings kept between runs.
#[derive(Serialize, Deserialize)]
#[serde(default)]
struct Config {
    recent_files: Vec<PathBuf>,
    scale: f32,
    console: Option<ConsoleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recent_files: Vec::new(),
            scale: 2.0,
            console: None,
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "PV8", "pv8-desktop")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

fn load_config() -> Config {
    let Some(mut path) = config_dir() else {
        return Config::default();
    };
    path.push("config.toml");
    let Ok(config_str) = fs::read_to_string(&path) else {
        return Config::default();
    };
    toml::from_str(&config_str).unwrap_or_default()
}

fn save_config(config: &Config) -> io::Result<()> {
    if let Some(mut path) = config_dir() {
        fs::create_dir_all(&path)?;
        path.push("config.toml");
        let config_str = toml::to_string(config).map_err(io::Error::other)?;
        fs::write(&path, config_str)?;
    }
    Ok(())
}

fn load_console_config(path: &Path) -> Result<ConsoleConfig, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let config: ConsoleConfig = toml::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

enum AppState {
    FileSelection,
    Viewing(PathBuf),
}

struct ViewerApp {
    state: AppState,
    config: Config,
    console_config: ConsoleConfig,
    console: Console,
    loaded: Option<PathBuf>,
    load_error: Option<String>,
    scroll: (i32, i32),
    texture: Option<egui::TextureHandle>,
    show_debug_panel: bool,
    log_entries: Vec<DisplayLogEntry>,
    auto_scroll_logs: bool,
    log_filter: LogFilter,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LogFilter {
    All,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl ViewerApp {
    fn new(game_path: Option<PathBuf>, console_config: Option<ConsoleConfig>) -> Self {
        let mut config = load_config();
        let console_config = console_config
            .or_else(|| config.console.clone())
            .unwrap_or_default();

        let state = match game_path {
            Some(path) => {
                Self::add_to_recent(&mut config.recent_files, path.clone());
                AppState::Viewing(path)
            }
            None => AppState::FileSelection,
        };

        Self {
            state,
            config,
            console: Console::new(&console_config),
            console_config,
            loaded: None,
            load_error: None,
            scroll: (0, 0),
            texture: None,
            show_debug_panel: cfg!(debug_assertions),
            log_entries: Vec::new(),
            auto_scroll_logs: true,
            log_filter: LogFilter::All,
        }
    }

    fn add_to_recent(recent: &mut Vec<PathBuf>, path: PathBuf) {
        if let Some(index) = recent.iter().position(|p| p == &path) {
            recent.remove(index);
        }
        recent.insert(0, path);
        recent.truncate(10);
    }

    fn open_game(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .set_title("Open game data")
            .add_filter("Game data", &["json"])
            .pick_file()
        {
            Self::add_to_recent(&mut self.config.recent_files, path.clone());
            self.state = AppState::Viewing(path);
        }
    }

    /// Loads `path` into a fresh console unless it is already showing.
    fn ensure_loaded(&mut self, path: &Path) {
        if self.loaded.as_deref() == Some(path) {
            return;
        }

        self.console = Console::new(&self.console_config);
        self.scroll = (0, 0);
        self.loaded = Some(path.to_path_buf());

        let result = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| self.console.load_game_data(&json).map_err(|e| e.to_string()));

        match result {
            Ok(()) => {
                self.load_error = None;
                log::info!("loaded {}", path.display());
            }
            Err(e) => {
                log::error!("failed to load {}: {}", path.display(), e);
                self.load_error = Some(e);
            }
        }
    }

    fn handle_scroll_keys(&mut self, ctx: &egui::Context) {
        ctx.input(|i| {
            if i.key_down(egui::Key::ArrowLeft) {
                self.scroll.0 -= 1;
            }
            if i.key_down(egui::Key::ArrowRight) {
                self.scroll.0 += 1;
            }
            if i.key_down(egui::Key::ArrowUp) {
                self.scroll.1 -= 1;
            }
            if i.key_down(egui::Key::ArrowDown) {
                self.scroll.1 += 1;
            }
        });
    }

    /// Queues this frame's draw calls: the tilemap at the scroll offset and
    /// a frame counter in the first registered font.
    fn queue_frame(&mut self) {
        let (width, height) = (self.console.display().width(), self.console.display().height());
        let sample = Rect::new(self.scroll.0, self.scroll.1, width, height);

        self.console.clear();
        self.console.draw_tilemap(sample, 0, 0, DrawOptions::default());

        if self.console.fonts().total_fonts() > 0 {
            let label = format!("FRAME {}", self.console.frame());
            let overlay = DrawOptions { layer: 1, ..Default::default() };
            self.console.draw_text(&label, 2, 2, "", 0, overlay);
        }
    }

    fn poll_logs(&mut self) {
        let new_logs = pv8_core::log_buffer::drain_logs();
        for entry in new_logs {
            self.log_entries.push(entry.into());
        }
        const MAX_LOG_ENTRIES: usize = 2000;
        if self.log_entries.len() > MAX_LOG_ENTRIES {
            let excess = self.log_entries.len() - MAX_LOG_ENTRIES;
            self.log_entries.drain(0..excess);
        }
    }

    fn level_color(level: log::Level) -> egui::Color32 {
        match level {
            log::Level::Error => egui::Color32::from_rgb(255, 100, 100),
            log::Level::Warn => egui::Color32::from_rgb(255, 200, 100),
            log::Level::Info => egui::Color32::from_rgb(100, 200, 255),
            log::Level::Debug => egui::Color32::from_rgb(180, 180, 180),
            log::Level::Trace => egui::Color32::from_rgb(120, 120, 120),
        }
    }

    fn filter_matches(&self, level: log::Level) -> bool {
        match self.log_filter {
            LogFilter::All => true,
            LogFilter::Error => level == log::Level::Error,
            LogFilter::Warn => level <= log::Level::Warn,
            LogFilter::Info => level <= log::Level::Info,
            LogFilter::Debug => level <= log::Level::Debug,
            LogFilter::Trace => true,
        }
    }

    fn stats_ui(&self, ui: &mut egui::Ui) {
        let display = self.console.display();
        let sprites = self.console.sprites();
        let tilemap = self.console.tilemap();

        egui::Grid::new("stats").num_columns(2).show(ui, |ui| {
            ui.label("Frame");
            ui.label(self.console.frame().to_string());
            ui.end_row();
            ui.label("Display");
            ui.label(format!("{}x{}", display.width(), display.height()));
            ui.end_row();
            ui.label("Draw limit");
            ui.label(display.max_draw_requests().to_string());
            ui.end_row();
            ui.label("Palette");
            ui.label(format!("{} colors", self.console.hex_colors().len()));
            ui.end_row();
            ui.label("Sprites");
            ui.label(format!("{} / {}", sprites.sprites_in_memory(), sprites.total_sprites()));
            ui.end_row();
            ui.label("Tilemap");
            ui.label(format!("{}x{}", tilemap.columns(), tilemap.rows()));
            ui.end_row();
            ui.label("Fonts");
            ui.label(self.console.fonts().font_names().collect::<Vec<_>>().join(", "));
            ui.end_row();
            ui.label("Scroll");
            ui.label(format!("{}, {}", self.scroll.0, self.scroll.1));
            ui.end_row();
        });
    }

    fn log_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Filter:");
            ui.selectable_value(&mut self.log_filter, LogFilter::All, "All");
            ui.selectable_value(&mut self.log_filter, LogFilter::Error, "Error");
            ui.selectable_value(&mut self.log_filter, LogFilter::Warn, "Warn");
            ui.selectable_value(&mut self.log_filter, LogFilter::Info, "Info");
            ui.selectable_value(&mut self.log_filter, LogFilter::Debug, "Debug");
            ui.selectable_value(&mut self.log_filter, LogFilter::Trace, "Trace");
        });

        ui.horizontal(|ui| {
            ui.checkbox(&mut self.auto_scroll_logs, "Auto-scroll");
            if ui.button("Clear").clicked() {
                self.log_entries.clear();
            }
        });
        ui.separator();

        let text_style = egui::TextStyle::Monospace;
        let row_height = ui.text_style_height(&text_style);
        let filtered: Vec<_> = self
            .log_entries
            .iter()
            .filter(|e| self.filter_matches(e.level))
            .collect();

        egui::ScrollArea::vertical()
            .auto_shrink([true, false])
            .stick_to_bottom(self.auto_scroll_logs)
            .show_rows(ui, row_height, filtered.len(), |ui, row_range| {
                for i in row_range {
                    if let Some(entry) = filtered.get(i) {
                        let color = Self::level_color(entry.level);
                        let short_target = entry.target.split("::").last().unwrap_or(&entry.target);
                        ui.horizontal(|ui| {
                            ui.colored_label(egui::Color32::GRAY, format!("{:>6}", entry.frame));
                            ui.colored_label(color, format!("[{:5}]", entry.level));
                            ui.colored_label(egui::Color32::GRAY, format!("{:>8}", short_target));
                            ui.label(&entry.message);
                        });
                    }
                }
            });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_logs();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open game data...").clicked() {
                        self.open_game();
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("Window", |ui| {
                    ui.add(egui::Slider::new(&mut self.config.scale, 1.0..=4.0).text("Scale"));
                    if ui.checkbox(&mut self.show_debug_panel, "Debug Panel").clicked() {
                        ui.close_menu();
                    }
                });
            });
        });

        if self.show_debug_panel {
            egui::SidePanel::right("debug_panel")
                .resizable(true)
                .min_width(250.0)
                .default_width(350.0)
                .max_width(500.0)
                .show(ctx, |ui| {
                    ui.heading("Console");
                    ui.separator();
                    self.stats_ui(ui);
                    ui.separator();
                    ui.heading("Debug Log");
                    ui.separator();
                    self.log_ui(ui);
                });
        }

        let viewing = match &self.state {
            AppState::Viewing(path) => Some(path.clone()),
            AppState::FileSelection => None,
        };

        egui::CentralPanel::default().show(ctx, |ui| match viewing {
            None => {
                ui.heading("Recently Opened Games");
                ui.separator();

                if self.config.recent_files.is_empty() {
                    ui.label("No recent files found. Use 'File -> Open game data...' to get started.");
                } else {
                    let mut picked = None;
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        for file in &self.config.recent_files {
                            if ui.button(file.display().to_string()).clicked() {
                                picked = Some(file.clone());
                            }
                        }
                    });
                    if let Some(path) = picked {
                        self.state = AppState::Viewing(path);
                    }
                }
            }
            Some(path) => {
                self.ensure_loaded(&path);
                ui.label(format!("Viewing: {}", path.display()));
                if let Some(err) = &self.load_error {
                    ui.colored_label(egui::Color32::from_rgb(255, 100, 100), err);
                }
                ui.separator();

                self.handle_scroll_keys(ctx);
                self.queue_frame();
                self.console.run_frame();

                let size = [self.console.display().width(), self.console.display().height()];
                let rgba = self.console.framebuffer_rgba();
                let image = egui::ColorImage::from_rgba_unmultiplied(size, rgba);
                let tex = self.texture.get_or_insert_with(|| {
                    ui.ctx().load_texture("framebuffer", image.clone(), egui::TextureOptions::NEAREST)
                });
                tex.set(image, egui::TextureOptions::NEAREST);

                let scale = self.config.scale;
                let desired = egui::Vec2::new(size[0] as f32 * scale, size[1] as f32 * scale);
                ui.image((tex.id(), desired));
            }
        });

        ctx.request_repaint();
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Err(e) = save_config(&self.config) {
            eprintln!("Failed to save config: {}", e);
        }
    }
}

fn main() -> eframe::Result<()> {
    let log_level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = pv8_core::log_buffer::init_logger(log_level);

    let args = Args::parse();
    let console_config = match args.config.as_deref().map(load_console_config) {
        Some(Ok(config)) => Some(config),
        Some(Err(e)) => {
            log::error!("ignoring console config: {}", e);
            None
        }
        None => None,
    };

    let icon = IconData::default();
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_title("PV8 Viewer")
            .with_app_id("com.pv8.viewer")
            .with_icon(icon),
        ..Default::default()
    };

    eframe::run_native(
        "PV8 Viewer",
        native_options,
        Box::new(|_cc| Ok(Box::new(ViewerApp::new(args.game_path, console_config)))),
    )
}
