//! Maps a decoded command onto exactly one probe or mutator.
//!
//! Mutating commands answer with the matching read probe re-run after the
//! change, so the client always sees current state: `SetGPIO` replies like
//! `GetGPIO`, `KillProcess` like `GetProcesses`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::board::BoardContext;
use crate::config::ProbeConfig;
use crate::error::ProbeResult;
use crate::probes::{disks, gpio, ir, net, procs, stats, w1};
use crate::proto::{decode_command, encode_reply, Command};
use crate::types::{
    FilesystemsReply, GpioReply, NetDevicesReply, ProcessesReply, Reply, StatisticsReply,
    TempSensorsReply,
};

pub const NOT_SUPPORTED: &str = "Not supported command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    GetGpio,
    GetTempSensors,
    GetProcesses,
    GetStatistics,
    GetFilesystems,
    GetNetDevices,
    SetGpio,
    KillProcess,
    SendIr,
}

impl CommandKind {
    pub const ALL: [CommandKind; 9] = [
        CommandKind::GetGpio,
        CommandKind::GetTempSensors,
        CommandKind::GetProcesses,
        CommandKind::GetStatistics,
        CommandKind::GetFilesystems,
        CommandKind::GetNetDevices,
        CommandKind::SetGpio,
        CommandKind::KillProcess,
        CommandKind::SendIr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::GetGpio => "GetGPIO",
            CommandKind::GetTempSensors => "GetTempSensors",
            CommandKind::GetProcesses => "GetProcesses",
            CommandKind::GetStatistics => "GetStatistics",
            CommandKind::GetFilesystems => "GetFilesystems",
            CommandKind::GetNetDevices => "GetNetDevices",
            CommandKind::SetGpio => "SetGPIO",
            CommandKind::KillProcess => "KillProcess",
            CommandKind::SendIr => "SendIR",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

pub struct CommandRouter {
    probes: ProbeConfig,
    board: Arc<BoardContext>,
    show_json: bool,
}

impl CommandRouter {
    pub fn new(probes: ProbeConfig, board: Arc<BoardContext>, show_json: bool) -> Self {
        Self {
            probes,
            board,
            show_json,
        }
    }

    /// Decode, dispatch and encode one request frame.
    pub async fn handle_frame(&self, session: u64, frame: &[u8]) -> Vec<u8> {
        let reply = match decode_command(frame) {
            Ok(cmd) => self.dispatch(session, &cmd).await,
            Err(reply) => reply,
        };
        let bytes = encode_reply(&reply);
        if self.show_json && !bytes.is_empty() {
            info!(session, json = %String::from_utf8_lossy(&bytes), "reply");
        }
        bytes
    }

    pub async fn dispatch(&self, session: u64, cmd: &Command) -> Reply {
        let Some(kind) = CommandKind::from_name(&cmd.name) else {
            warn!(session, cmd = %cmd.name, "not supported command");
            return Reply::error(NOT_SUPPORTED);
        };
        info!(session, cmd = kind.name(), "processing request");

        let reply = match kind {
            CommandKind::GetGpio => into_reply(self.gpio_state()),
            CommandKind::GetTempSensors => into_reply(self.temp_sensors().await),
            CommandKind::GetProcesses => into_reply(self.processes()),
            CommandKind::GetStatistics => into_reply(self.statistics().await),
            CommandKind::GetFilesystems => into_reply(self.filesystems()),
            CommandKind::GetNetDevices => into_reply(self.net_devices()),
            CommandKind::SetGpio => into_reply(
                gpio::set_gpio(&self.probes.paths.gpio_dir, &cmd.args).and_then(|()| self.gpio_state()),
            ),
            CommandKind::KillProcess => into_reply(self.kill_process(&cmd.args).await),
            CommandKind::SendIr => match ir::send_ir(&self.probes.irsend, &cmd.args).await {
                Ok(()) => Reply::Empty,
                Err(e) => Reply::error(e.to_string()),
            },
        };
        if let Reply::Error(e) = &reply {
            warn!(session, cmd = kind.name(), error = %e.error, "command failed");
        }
        reply
    }

    fn gpio_state(&self) -> ProbeResult<Reply> {
        let lines = gpio::list_gpio(&self.probes.paths.gpio_dir)?;
        Ok(Reply::Gpio(GpioReply {
            lines,
            revision: self.board.revision().to_string(),
        }))
    }

    async fn temp_sensors(&self) -> ProbeResult<Reply> {
        let paths = &self.probes.paths;
        let sensors = w1::scan_temp_sensors(
            &paths.w1_bus_master,
            &paths.w1_devices_dir,
            w1::privileged(),
            self.probes.settle_delay,
        )
        .await?;
        Ok(Reply::TempSensors(TempSensorsReply { sensors }))
    }

    fn processes(&self) -> ProbeResult<Reply> {
        let processes = procs::list_processes(&self.probes.paths.proc_dir, procs::user_name)?;
        Ok(Reply::Processes(ProcessesReply { processes }))
    }

    /// Kill, wait for the pid to die, then list without it.
    async fn kill_process(&self, args: &str) -> ProbeResult<Reply> {
        let pid = procs::kill_process(args)?;
        let proc_dir = &self.probes.paths.proc_dir;
        procs::wait_for_exit(proc_dir, pid, procs::KILL_WAIT).await;
        let mut processes = procs::list_processes(proc_dir, procs::user_name)?;
        processes.retain(|p| !(p.pid == pid && procs::is_zombie(p)));
        Ok(Reply::Processes(ProcessesReply { processes }))
    }

    async fn statistics(&self) -> ProbeResult<Reply> {
        let statistics = stats::collect_statistics(&self.board, &self.probes).await?;
        Ok(Reply::Statistics(StatisticsReply { statistics }))
    }

    fn filesystems(&self) -> ProbeResult<Reply> {
        let filesystems = disks::list_filesystems(&self.probes.paths.mounts, |_| true)?;
        Ok(Reply::Filesystems(FilesystemsReply { filesystems }))
    }

    fn net_devices(&self) -> ProbeResult<Reply> {
        let devices = net::list_net_devices(&self.probes.paths.net_dir, |_| true)?;
        Ok(Reply::NetDevices(NetDevicesReply { devices }))
    }
}

fn into_reply(result: ProbeResult<Reply>) -> Reply {
    result.unwrap_or_else(|e| Reply::error(e.to_string()))
}
