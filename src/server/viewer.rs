//! Browser viewer: refreshes the raw frame and draws detection overlays.

use crate::capture::frame::Resolution;

const WIDTH_PLACEHOLDER: &str = "%MODEL_WIDTH%";
const HEIGHT_PLACEHOLDER: &str = "%MODEL_HEIGHT%";

const VIEWER_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>camdetect</title>
    <meta name="viewport" content="width=device-width, initial-scale=1, user-scalable=no">
    <style>
        body { font-family: Arial, Helvetica, sans-serif; text-align: center; margin: 0 auto; padding-top: 20px; background: #f7f7f7; }
        h1 { color: #333; }
        #stream-container { position: relative; width: 320px; height: 240px; margin: 20px auto; border: 1px solid #ccc; background: #000; }
        #frame { display: block; width: 100%; height: 100%; }
        #overlay { position: absolute; top: 0; left: 0; width: 100%; height: 100%; }
        #status { font-family: monospace; font-size: 12px; color: #777; }
    </style>
</head>
<body>
    <h1>Object detection</h1>
    <div id="stream-container">
        <img id="frame" src="/shot">
        <canvas id="overlay"></canvas>
    </div>
    <div id="status">connecting</div>
    <script>
        const frame = document.getElementById('frame'),
              canvas = document.getElementById('overlay'),
              status = document.getElementById('status'),
              ctx = canvas.getContext('2d');
        const modelWidth = %MODEL_WIDTH%, modelHeight = %MODEL_HEIGHT%;

        function connect() {
            const ws = new WebSocket((location.protocol === 'https:' ? 'wss://' : 'ws://') + location.host + '/ws');
            ws.onopen = () => { status.textContent = 'connected'; };
            ws.onclose = () => {
                status.textContent = 'disconnected, retrying';
                setTimeout(connect, 2000);
            };
            ws.onmessage = (ev) => {
                try {
                    const data = JSON.parse(ev.data);
                    if (data.boxes) draw(data.boxes);
                } catch (e) {}
            };
        }

        function draw(boxes) {
            canvas.width = frame.parentElement.offsetWidth;
            canvas.height = frame.parentElement.offsetHeight;
            ctx.clearRect(0, 0, canvas.width, canvas.height);
            const sx = canvas.width / modelWidth, sy = canvas.height / modelHeight;
            ctx.font = '14px Arial';
            ctx.lineWidth = 2;
            boxes.forEach(box => {
                const x = box.x * sx, y = box.y * sy, w = box.width * sx, h = box.height * sy;
                ctx.strokeStyle = 'lime';
                ctx.strokeRect(x, y, w, h);
                const text = `${box.label} (${(100 * box.value).toFixed(1)}%)`,
                      ty = y > 18 ? y - 5 : y + h + 15;
                ctx.fillStyle = 'rgba(0,0,0,0.5)';
                ctx.fillRect(x, ty - 14, ctx.measureText(text).width + 4, 18);
                ctx.fillStyle = 'lime';
                ctx.fillText(text, x + 2, ty);
            });
        }

        window.onload = () => {
            connect();
            setInterval(() => { frame.src = '/shot?t=' + Date.now(); }, 100);
        };
    </script>
</body>
</html>
"#;

/// Viewer page with the model input resolution substituted in, so overlay
/// coordinates are scaled against the real model size.
pub fn render(model: Resolution) -> String {
    VIEWER_HTML
        .replace(WIDTH_PLACEHOLDER, &model.width.to_string())
        .replace(HEIGHT_PLACEHOLDER, &model.height.to_string())
}
