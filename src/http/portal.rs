//! Demo page served at `/`.
//!
//! A small form that opens a WebSocket under the route prefix and shows what
//! comes back. Only the location base varies between requests.

const TEMPLATE: &str = r#"<html><head><title>WSIN Portal</title></head>
<body>
<script type="text/javascript">
var socket;
function openws(wspath) {
  if (!window.WebSocket) {
    alert("Your browser does not support WebSocket.");
    return;
  }
  socket = new WebSocket("{{LOCATION}}" + wspath);
  var out = document.getElementById('output');
  socket.onopen = function() { out.value = "WebSocket opened!\n"; };
  socket.onmessage = function(event) {
    out.value = out.value.slice(-10000) + event.data + "\n";
    out.scrollTop = out.scrollHeight;
  };
  socket.onclose = function(event) { out.value += "WebSocket closed (" + event.code + ")\n"; };
}
function send(message) {
  if (socket && socket.readyState == WebSocket.OPEN) {
    socket.send(message);
  } else {
    alert("The socket is not open.");
  }
}
</script>
<form onsubmit="return false;">
<input type="text" name="wspath" placeholder="host/service/path"/>
<input type="button" value="Connect" onclick="openws(this.form.wspath.value)"/>
<input type="text" name="message" value="Hello, World!"/>
<input type="button" value="Send" onclick="send(this.form.message.value)"/>
<h3>Output</h3>
<textarea id="output" style="width:95%;height:80%;background:#000;color:#0c0;"></textarea>
</form>
</body>
</html>
"#;

/// `ws://<host>/<prefix>/`, the base every route on this proxy starts with.
pub fn location_base(host: &str, route_prefix: &str) -> String {
    format!("ws://{}/{}/", host, route_prefix)
}

/// Render the page for a request that arrived with `Host: host`.
pub fn render(host: &str, route_prefix: &str) -> String {
    TEMPLATE.replace("{{LOCATION}}", &escape_js(&location_base(host, route_prefix)))
}

/// Host headers are client-controlled; keep them inside the string literal.
fn escape_js(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
