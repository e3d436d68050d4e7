use std::time::Duration;

use anyhow::{bail, Context};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, warn};

use heatnode_common::{AckStatus, Command, FrameAssembler, GainSelector, Response};

const DEFAULT_ADDR: &str = "127.0.0.1:7878";
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const REPLY_CAPACITY: usize = 32;

const USAGE: &str = "usage: heatnode-console [--addr HOST:PORT] \
<current | desired | set-desired <C> | gain <p|i|d> <value> | verbose | raw <frame> | watch [seconds]>";

#[derive(Debug, Clone, PartialEq)]
enum Request {
    Send(Command),
    Raw(String),
    Watch(Duration),
}

#[derive(Debug, Clone, PartialEq)]
struct Invocation {
    addr: String,
    request: Request,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = parse_args(&args)?;

    let mut stream = TcpStream::connect(&invocation.addr)
        .await
        .with_context(|| format!("failed to connect to node at {}", invocation.addr))?;
    debug!("connected to {}", invocation.addr);

    match invocation.request {
        Request::Send(command) => {
            let frame = command
                .encode()
                .with_context(|| format!("cannot encode {command:?}"))?;
            let response = exchange(&mut stream, &frame).await?;
            report(&response)
        }
        Request::Raw(text) => {
            let response = exchange(&mut stream, text.as_bytes()).await?;
            report(&response)
        }
        Request::Watch(every) => watch(&mut stream, every).await,
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<Invocation> {
    let mut addr = std::env::var("HEATNODE_SERIAL_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let mut rest = args;
    if let [flag, value, tail @ ..] = rest {
        if flag == "--addr" {
            addr = value.clone();
            rest = tail;
        }
    }

    let words: Vec<&str> = rest.iter().map(String::as_str).collect();
    let request = match words.as_slice() {
        ["current"] => Request::Send(Command::GetCurrent),
        ["desired"] => Request::Send(Command::GetDesired),
        ["verbose"] => Request::Send(Command::ToggleVerbose),
        ["set-desired", temp] => {
            let temp_c = temp
                .parse::<i32>()
                .with_context(|| format!("invalid temperature {temp:?}"))?;
            Request::Send(Command::SetDesired(temp_c))
        }
        ["gain", selector, value] => {
            let selector = match *selector {
                "p" => GainSelector::Kp,
                "i" => GainSelector::Ki,
                "d" => GainSelector::Kd,
                other => bail!("unknown gain {other:?}, expected p, i or d"),
            };
            let value = value
                .parse::<f32>()
                .with_context(|| format!("invalid gain value {value:?}"))?;
            Request::Send(Command::SetGain(selector, value))
        }
        ["raw", frame] => Request::Raw(frame.to_string()),
        ["watch"] => Request::Watch(Duration::from_secs(1)),
        ["watch", seconds] => {
            let seconds = seconds
                .parse::<u64>()
                .with_context(|| format!("invalid watch period {seconds:?}"))?;
            Request::Watch(Duration::from_secs(seconds.max(1)))
        }
        _ => bail!("{USAGE}"),
    };

    Ok(Invocation { addr, request })
}

async fn exchange<S>(stream: &mut S, frame: &[u8]) -> anyhow::Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(frame)
        .await
        .context("failed to send request")?;
    let reply = tokio::time::timeout(REPLY_TIMEOUT, read_frame(stream))
        .await
        .context("timed out waiting for reply")??;
    debug!("reply {:?}", String::from_utf8_lossy(&reply));
    Response::parse(&reply).with_context(|| format!("bad reply {:?}", String::from_utf8_lossy(&reply)))
}

async fn read_frame<R>(reader: &mut R) -> anyhow::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut assembler = FrameAssembler::new(REPLY_CAPACITY);
    let mut chunk = [0u8; REPLY_CAPACITY];
    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .context("failed to read reply")?;
        if read == 0 {
            bail!("node closed the link before replying");
        }
        // One request, one reply: anything after the first frame is stale.
        if let Some(frame) = assembler.extend(&chunk[..read]).into_iter().next() {
            return Ok(frame.into_bytes());
        }
    }
}

fn describe(response: &Response) -> String {
    match response {
        Response::Current(temp_c) => format!("current temperature: {temp_c} C"),
        Response::Desired(temp_c) => format!("desired temperature: {temp_c} C"),
        Response::Ack(status) => status.as_str().to_string(),
    }
}

fn report(response: &Response) -> anyhow::Result<()> {
    match response {
        Response::Ack(status) if *status != AckStatus::Ok => {
            bail!("node refused request: {}", status.as_str())
        }
        _ => {
            println!("{}", describe(response));
            Ok(())
        }
    }
}

async fn watch(stream: &mut TcpStream, every: Duration) -> anyhow::Result<()> {
    let frame = Command::GetCurrent.encode()?;
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match exchange(stream, &frame).await {
            Ok(response) => println!("{}", describe(&response)),
            Err(err) => warn!("poll failed: {err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio::io::duplex;

    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    #[test]
    fn parses_commands() {
        let invocation = parse_args(&args(&["--addr", "10.0.0.2:9000", "set-desired", "-5"])).unwrap();
        assert_eq!(invocation.addr, "10.0.0.2:9000");
        assert_eq!(invocation.request, Request::Send(Command::SetDesired(-5)));

        let invocation = parse_args(&args(&["gain", "i", "0.25"])).unwrap();
        assert_eq!(
            invocation.request,
            Request::Send(Command::SetGain(GainSelector::Ki, 0.25))
        );

        let invocation = parse_args(&args(&["watch", "5"])).unwrap();
        assert_eq!(invocation.request, Request::Watch(Duration::from_secs(5)));
    }

    #[test]
    fn rejects_unknown_gain_and_words() {
        assert!(parse_args(&args(&["gain", "x", "1.0"])).is_err());
        assert!(parse_args(&args(&["launch"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }

    #[test]
    fn error_ack_fails_the_command() {
        assert!(report(&Response::Ack(AckStatus::Ok)).is_ok());
        assert!(report(&Response::Current(21)).is_ok());
        assert!(report(&Response::Ack(AckStatus::Checksum)).is_err());
    }

    #[tokio::test]
    async fn exchange_reads_reply_split_across_writes() {
        let (mut console, mut node) = duplex(64);

        let node_side = tokio::spawn(async move {
            let mut request = [0u8; 6];
            node.read_exact(&mut request).await.unwrap();
            assert_eq!(&request, b"#C067!");
            node.write_all(b"\r\n#c+2").await.unwrap();
            node.write_all(b"8248!").await.unwrap();
        });

        let response = exchange(&mut console, b"#C067!").await.unwrap();
        assert_eq!(response, Response::Current(28));
        node_side.await.unwrap();
    }
}
