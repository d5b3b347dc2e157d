//! System tray surface using StatusNotifierItem (SNI).

use ksni::{menu::*, Handle, ToolTip, Tray, TrayService};
use tokio::sync::mpsc;
use tracing::debug;

use crate::icon::RenderedIcon;
use crate::scheduler::Surface;

/// Commands sent from tray callbacks back to the main loop.
#[derive(Debug, Clone)]
pub enum TrayCommand {
    Quit,
}

/// The pump mirror tray icon.
pub struct PumpTray {
    icon: Vec<ksni::Icon>,
    status: String,
    command_tx: mpsc::UnboundedSender<TrayCommand>,
}

impl PumpTray {
    fn quit(&self) {
        if let Err(e) = self.command_tx.send(TrayCommand::Quit) {
            debug!("Failed to send quit command: {}", e);
        }
    }
}

impl Tray for PumpTray {
    fn id(&self) -> String {
        "glacier-temp".to_string()
    }

    fn title(&self) -> String {
        "Glacier Temp".to_string()
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        self.icon.clone()
    }

    fn tool_tip(&self) -> ToolTip {
        ToolTip {
            title: "Glacier Temp".to_string(),
            description: self.status.clone(),
            ..Default::default()
        }
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        vec![StandardItem {
            label: "Quit".to_string(),
            activate: Box::new(|tray: &mut Self| {
                tray.quit();
            }),
            ..Default::default()
        }
        .into()]
    }
}

/// Creates the tray service, an update handle, and the command receiver.
pub fn create_tray() -> (
    TrayService<PumpTray>,
    Handle<PumpTray>,
    mpsc::UnboundedReceiver<TrayCommand>,
) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let tray = PumpTray {
        icon: Vec::new(),
        status: "starting".to_string(),
        command_tx,
    };
    let service = TrayService::new(tray);
    let handle = service.handle();
    (service, handle, command_rx)
}

/// Pushes scheduler updates into the tray service.
pub struct TrayHandle {
    handle: Handle<PumpTray>,
}

impl TrayHandle {
    pub fn new(handle: Handle<PumpTray>) -> Self {
        Self { handle }
    }
}

impl Surface for TrayHandle {
    fn set_icon(&mut self, icon: RenderedIcon) {
        self.handle.update(move |tray| {
            tray.icon = vec![ksni::Icon {
                width: icon.width,
                height: icon.height,
                data: icon.argb.clone(),
            }];
        });
    }

    fn set_status(&mut self, status: &str) {
        let status = status.to_string();
        self.handle.update(move |tray| {
            tray.status = status.clone();
        });
    }
}
